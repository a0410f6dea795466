//! Quick search performance test

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;
use uio_search::{
    EvolutionConfig, EvolutionEngine, Fsm,
    schema::{CandidateShape, FsmDefaults, GeneticAlgorithmConfig, SelectionMethod},
};

fn main() {
    println!("=== UIO Search Performance Test ===\n");

    for states in [50, 200, 1000] {
        for shape in [CandidateShape::Flat, CandidateShape::Adaptive] {
            println!("States: {}, shape: {:?}", states, shape);

            let defaults = FsmDefaults {
                number_of_states: states,
                ..Default::default()
            };
            let fsm = Arc::new(
                Fsm::random(&defaults, &mut StdRng::seed_from_u64(42)).expect("valid defaults"),
            );
            let targets: BTreeSet<usize> = (0..states).collect();

            let config = EvolutionConfig {
                population_size: 100,
                generation: 20,
                max_uio_length: 8,
                early_stop: false,
                ga: GeneticAlgorithmConfig {
                    selection: SelectionMethod::Tournament { size: 3 },
                    shape,
                    ..Default::default()
                },
                random_seed: Some(42),
                ..Default::default()
            };

            let start = Instant::now();
            let mut engine = EvolutionEngine::new(config, fsm, targets).expect("valid parameters");
            let result = engine.run().expect("search failed");
            let elapsed = start.elapsed();

            println!("  Generations:    {}", result.stats.generations);
            println!("  Evaluations:    {}", result.stats.total_evaluations);
            println!("  Workers:        {}", result.stats.workers);
            println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
            println!("  Evals/sec:      {:.1}", result.stats.evaluations_per_second);
            println!(
                "  Discovered:     {}/{}",
                result.discovered.len(),
                states
            );
            println!();
        }
    }
}
