//! Benchmarks for candidate evaluation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use uio_search::{
    compute::{
        Fsm,
        evolution::{
            DistinguishingProfile, EvaluationScheduler, FitnessEvaluator, GenomeRng,
            RegistrySnapshot, SplittingTree,
        },
    },
    schema::{CandidateShape, DigraphShape, FitnessConfig, FsmDefaults, Genome},
};

fn machine(states: usize, rng: &mut GenomeRng) -> Fsm {
    let defaults = FsmDefaults {
        number_of_states: states,
        digraph_shape_selection: DigraphShape::Symmetric,
        ..Default::default()
    };
    Fsm::random(&defaults, rng.inner_mut()).expect("valid defaults")
}

fn bench_distinguishing(c: &mut Criterion) {
    let mut group = c.benchmark_group("distinguishing");

    for states in [100, 1000, 10000] {
        let mut rng = GenomeRng::new(42);
        let fsm = machine(states, &mut rng);
        let genome = rng.random_genome(3, 8);

        group.bench_with_input(BenchmarkId::new("profile", states), &states, |b, _| {
            b.iter(|| DistinguishingProfile::compute(black_box(&fsm), black_box(genome.as_slice())));
        });
        group.bench_with_input(BenchmarkId::new("tree", states), &states, |b, _| {
            b.iter(|| SplittingTree::build(black_box(&fsm), black_box(genome.as_slice()), 8));
        });
    }

    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(20);

    let mut rng = GenomeRng::new(7);
    let fsm = machine(1000, &mut rng);
    let genomes: Vec<Genome> = (0..200).map(|_| rng.random_genome(3, 6)).collect();
    let snapshot = RegistrySnapshot::new((0..1000).collect());
    let evaluator = FitnessEvaluator::new(FitnessConfig::default(), CandidateShape::Flat, 6);

    let sequential = EvaluationScheduler::sequential();
    group.bench_function("sequential", |b| {
        b.iter(|| sequential.evaluate(&fsm, black_box(&genomes), &snapshot, &evaluator))
    });

    let parallel = EvaluationScheduler::new(true, 1).expect("thread pool");
    group.bench_function(format!("parallel_{}", parallel.workers()), |b| {
        b.iter(|| parallel.evaluate(&fsm, black_box(&genomes), &snapshot, &evaluator))
    });

    group.finish();
}

criterion_group!(benches, bench_distinguishing, bench_generation);
criterion_main!(benches);
