//! Fork/join evaluation of a generation.
//!
//! The population is split into contiguous index ranges, one per worker.
//! Every range is evaluated against the same immutable machine and registry
//! snapshot, and the results are joined back in population order before
//! anything is merged.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use super::{Evaluation, EvaluationError, FitnessEvaluator, RegistrySnapshot};
use crate::compute::Fsm;
use crate::schema::Genome;

/// Evaluates populations, on a thread pool or inline.
pub struct EvaluationScheduler {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl EvaluationScheduler {
    /// Build a scheduler with `available_parallelism * threads_per_cpu`
    /// workers, or a single inline worker when parallelism is disabled.
    pub fn new(
        parallelism_enabled: bool,
        threads_per_cpu: usize,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        if !parallelism_enabled {
            return Ok(Self::sequential());
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(cpus * threads_per_cpu.max(1))
    }

    /// Evaluate on the calling thread.
    pub fn sequential() -> Self {
        Self {
            pool: None,
            workers: 1,
        }
    }

    /// Evaluate on a dedicated pool of `workers` threads.
    pub fn with_workers(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let workers = workers.max(1);
        if workers == 1 {
            return Ok(Self::sequential());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("uio-eval-{i}"))
            .build()?;
        Ok(Self {
            pool: Some(pool),
            workers,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Disjoint contiguous ranges covering `0..len`, at most one per worker.
    pub fn ranges(&self, len: usize) -> Vec<Range<usize>> {
        if len == 0 {
            return Vec::new();
        }
        let chunks = self.workers.min(len);
        let base = len / chunks;
        let extra = len % chunks;

        let mut start = 0;
        (0..chunks)
            .map(|i| {
                let size = base + usize::from(i < extra);
                let range = start..start + size;
                start += size;
                range
            })
            .collect()
    }

    /// Evaluate every genome and return the results in population order.
    ///
    /// Any failing range fails the whole batch. Partial results are dropped.
    pub fn evaluate(
        &self,
        fsm: &Fsm,
        genomes: &[Genome],
        snapshot: &RegistrySnapshot,
        evaluator: &FitnessEvaluator,
    ) -> Result<Vec<Evaluation>, EvaluationError> {
        let Some(pool) = &self.pool else {
            return evaluate_range(fsm, genomes, 0..genomes.len(), snapshot, evaluator);
        };

        let ranges = self.ranges(genomes.len());
        let chunks: Vec<Vec<Evaluation>> = pool.install(|| {
            ranges
                .into_par_iter()
                .map(|range| evaluate_range(fsm, genomes, range, snapshot, evaluator))
                .collect::<Result<Vec<_>, EvaluationError>>()
        })?;

        Ok(chunks.into_iter().flatten().collect())
    }
}

/// Evaluate one range, turning a panic into a worker failure.
fn evaluate_range(
    fsm: &Fsm,
    genomes: &[Genome],
    range: Range<usize>,
    snapshot: &RegistrySnapshot,
    evaluator: &FitnessEvaluator,
) -> Result<Vec<Evaluation>, EvaluationError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        genomes[range.clone()]
            .iter()
            .map(|genome| evaluator.evaluate(fsm, genome, snapshot))
            .collect::<Result<Vec<_>, _>>()
    }));

    outcome.unwrap_or_else(|payload| {
        Err(EvaluationError::WorkerFailure {
            message: panic_message(payload.as_ref()),
            range,
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::GenomeRng;
    use crate::schema::{CandidateShape, DigraphShape, FitnessConfig, FsmDefaults};

    fn setup(seed: u64) -> (Fsm, Vec<Genome>, RegistrySnapshot) {
        let defaults = FsmDefaults {
            number_of_states: 30,
            digraph_shape_selection: DigraphShape::Symmetric,
            ..Default::default()
        };
        let mut rng = GenomeRng::new(seed);
        let fsm = Fsm::random(&defaults, rng.inner_mut()).unwrap();
        let genomes = (0..64).map(|_| rng.random_genome(3, 6)).collect();
        let snapshot = RegistrySnapshot::new((0..30).filter(|s| s % 3 != 0).collect());
        (fsm, genomes, snapshot)
    }

    #[test]
    fn test_ranges_partition() {
        let scheduler = EvaluationScheduler::with_workers(4).unwrap();
        let ranges = scheduler.ranges(10);
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);

        assert_eq!(scheduler.ranges(2), vec![0..1, 1..2]);
        assert!(scheduler.ranges(0).is_empty());
        assert_eq!(EvaluationScheduler::sequential().ranges(5), vec![0..5]);
    }

    #[test]
    fn test_disabled_parallelism_is_sequential() {
        let scheduler = EvaluationScheduler::new(false, 4).unwrap();
        assert!(!scheduler.is_parallel());
        assert_eq!(scheduler.workers(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (fsm, genomes, snapshot) = setup(11);
        for shape in [CandidateShape::Flat, CandidateShape::Adaptive] {
            let evaluator = FitnessEvaluator::new(FitnessConfig::default(), shape, 6);

            let sequential = EvaluationScheduler::sequential()
                .evaluate(&fsm, &genomes, &snapshot, &evaluator)
                .unwrap();
            let parallel = EvaluationScheduler::with_workers(4)
                .unwrap()
                .evaluate(&fsm, &genomes, &snapshot, &evaluator)
                .unwrap();

            assert_eq!(sequential.len(), genomes.len());
            assert_eq!(sequential, parallel);

            let union = |evals: &[Evaluation]| {
                evals
                    .iter()
                    .flat_map(|e| e.uios.keys().copied())
                    .collect::<std::collections::BTreeSet<_>>()
            };
            assert_eq!(union(&sequential), union(&parallel));
        }
    }

    #[test]
    fn test_error_aborts_batch() {
        let (fsm, mut genomes, snapshot) = setup(5);
        genomes[40] = Genome::new(vec![0, 99]);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), CandidateShape::Flat, 6);

        let result = EvaluationScheduler::with_workers(4)
            .unwrap()
            .evaluate(&fsm, &genomes, &snapshot, &evaluator);
        assert!(matches!(
            result,
            Err(EvaluationError::InvalidSymbol { input: 99, .. })
        ));
    }

    #[test]
    fn test_panic_becomes_worker_failure() {
        let (fsm, genomes, snapshot) = setup(5);
        let evaluator = FitnessEvaluator::new(FitnessConfig::default(), CandidateShape::Flat, 6);

        // Out-of-bounds slicing panics inside the worker.
        let result = evaluate_range(&fsm, &genomes, 60..70, &snapshot, &evaluator);
        match result {
            Err(EvaluationError::WorkerFailure { range, message }) => {
                assert_eq!(range, 60..70);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
