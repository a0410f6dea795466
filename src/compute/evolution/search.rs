//! Genetic search for unique input/output sequences.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};

use crate::compute::Fsm;
use crate::schema::{
    ConfigError, DiscoveredUio, EvolutionConfig, EvolutionConfigError, EvolutionPhase,
    EvolutionProgress, EvolutionResult, EvolutionStats, GenerationRecord, Genome, StateId,
    StopReason,
};

use super::fitness::{Evaluation, EvaluationError, FitnessEvaluator};
use super::genome::{self, GenomeRng};
use super::registry::DiscoveryRegistry;
use super::scheduler::EvaluationScheduler;
use super::selection::{SelectionStrategy, SymbolVariation, VariationOperator};
use super::statistics::{UioStatistics, summarize};

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier.
    pub id: u64,
    /// The genome.
    pub genome: Genome,
    /// Scores from the last evaluation, if any.
    pub evaluation: Option<Evaluation>,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
}

impl Candidate {
    /// Fitness of the last evaluation, 0 when not evaluated yet.
    pub fn fitness(&self) -> f32 {
        self.evaluation.as_ref().map_or(0.0, |e| e.fitness)
    }
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid run parameters: {0}")]
    Config(#[from] EvolutionConfigError),
    #[error("Invalid targets: {0}")]
    Targets(#[from] ConfigError),
    #[error("Failed to build evaluation pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Generation {generation} aborted: {source}")]
    Evaluation {
        generation: usize,
        #[source]
        source: EvaluationError,
    },
}

/// Evolution engine that runs the search.
///
/// The engine is the only owner of the discovery registry. Each generation
/// goes through `Evaluating -> Merging -> Selecting -> Reproducing`, and
/// evaluation always sees the registry as it was when the generation began.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    fsm: Arc<Fsm>,
    seed: u64,
    rng: GenomeRng,
    evaluator: FitnessEvaluator,
    scheduler: EvaluationScheduler,
    selection: Box<dyn SelectionStrategy>,
    variation: Box<dyn VariationOperator>,
    registry: DiscoveryRegistry,
    statistics: UioStatistics,
    population: Vec<Candidate>,
    seed_population: Option<Vec<Genome>>,
    generation: usize,
    phase: EvolutionPhase,
    best_fitness: f32,
    next_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    ///
    /// Every target must be a state of `fsm`.
    pub fn new(
        config: EvolutionConfig,
        fsm: Arc<Fsm>,
        targets: BTreeSet<StateId>,
    ) -> Result<Self, EvolutionError> {
        config.validate()?;
        let num_states = fsm.num_states();
        if let Some(&state) = targets.iter().find(|&&s| s >= num_states) {
            return Err(ConfigError::UnknownTargetState { state, num_states }.into());
        }

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let evaluator = FitnessEvaluator::new(
            config.fitness.clone(),
            config.ga.shape,
            config.max_uio_length,
        );
        let scheduler =
            EvaluationScheduler::new(config.parallelism_enabled, config.number_of_threads_per_cpu)?;
        let variation =
            SymbolVariation::new(&config.ga, fsm.input_set().len(), config.max_uio_length);

        if config.ga.elitism > config.population_size {
            warn!(
                "Elitism {} exceeds population size {}, clamping",
                config.ga.elitism, config.population_size
            );
        }

        Ok(Self {
            seed,
            rng: GenomeRng::new(seed),
            selection: Box::new(config.ga.selection.clone()),
            variation: Box::new(variation),
            registry: DiscoveryRegistry::new(targets),
            statistics: UioStatistics::new(config.statistics_window()),
            population: Vec::new(),
            seed_population: None,
            generation: 0,
            phase: EvolutionPhase::Initialized,
            best_fitness: f32::NEG_INFINITY,
            next_id: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            evaluator,
            scheduler,
            fsm,
            config,
        })
    }

    /// Replace the parent selection strategy.
    pub fn with_selection(mut self, selection: Box<dyn SelectionStrategy>) -> Self {
        self.selection = selection;
        self
    }

    /// Replace the crossover and mutation operators.
    pub fn with_variation(mut self, variation: Box<dyn VariationOperator>) -> Self {
        self.variation = variation;
        self
    }

    /// Replace the evaluation scheduler.
    pub fn with_scheduler(mut self, scheduler: EvaluationScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Start from these genomes instead of random ones.
    ///
    /// The list is cut or topped up with random genomes to the population
    /// size. Genomes are used as given.
    pub fn with_initial_population(mut self, genomes: Vec<Genome>) -> Self {
        self.seed_population = Some(genomes);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn fsm(&self) -> &Fsm {
        &self.fsm
    }

    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    pub fn statistics(&self) -> &UioStatistics {
        &self.statistics
    }

    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    /// Generations evaluated so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn workers(&self) -> usize {
        self.scheduler.workers()
    }

    /// Start a fresh run: new registry, statistics, RNG and population.
    ///
    /// Every run of the same engine replays the same seed, so repeated runs
    /// produce identical results.
    pub fn initialize(&mut self) {
        self.rng = GenomeRng::new(self.seed);
        let targets: BTreeSet<StateId> = self.registry.targets().collect();
        self.registry = DiscoveryRegistry::new(targets);
        self.statistics = UioStatistics::new(self.config.statistics_window());
        self.population.clear();
        self.generation = 0;
        self.best_fitness = f32::NEG_INFINITY;
        self.next_id = 0;
        self.phase = EvolutionPhase::Initialized;

        let alphabet = self.fsm.input_set().len();
        let mut genomes = self.seed_population.clone().unwrap_or_default();
        genomes.truncate(self.config.population_size);
        while genomes.len() < self.config.population_size {
            genomes.push(self.rng.random_genome(alphabet, self.config.max_uio_length));
        }

        for genome in genomes {
            let id = self.take_id();
            self.population.push(Candidate {
                id,
                genome,
                evaluation: None,
                generation: 0,
                parents: Vec::new(),
            });
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Evaluate the current population and merge its discoveries.
    ///
    /// On failure nothing is merged and the population keeps its previous
    /// scores.
    pub fn evaluate_generation(&mut self) -> Result<&GenerationRecord, EvolutionError> {
        self.phase = EvolutionPhase::Evaluating;
        let snapshot = self.registry.snapshot();
        let genomes: Vec<Genome> = self.population.iter().map(|c| c.genome.clone()).collect();

        let evaluations = self
            .scheduler
            .evaluate(&self.fsm, &genomes, &snapshot, &self.evaluator)
            .map_err(|source| EvolutionError::Evaluation {
                generation: self.generation,
                source,
            })?;

        self.phase = EvolutionPhase::Merging;
        let discovered = self.registry.merge(&evaluations);
        if !discovered.is_empty() {
            info!(
                "Generation {}: discovered UIOs for states {:?}",
                self.generation, discovered
            );
        }

        let record = summarize(
            self.generation,
            &self.fsm,
            &genomes,
            &evaluations,
            &self.registry,
        );
        self.best_fitness = self.best_fitness.max(record.fitness_max);
        debug!(
            "Generation {}: max {:.3}, mean {:.3}, {} open",
            record.generation, record.fitness_max, record.fitness_mean, record.open
        );

        for (candidate, evaluation) in self.population.iter_mut().zip(evaluations) {
            candidate.evaluation = Some(evaluation);
        }
        self.statistics.record(record);
        self.generation += 1;

        Ok(&self.statistics.records()[self.generation - 1])
    }

    /// Replace the population with the next generation.
    ///
    /// Does nothing before `initialize` has built a population.
    pub fn reproduce(&mut self) {
        if self.population.is_empty() {
            return;
        }
        self.phase = EvolutionPhase::Selecting;
        let fitness: Vec<f32> = self.population.iter().map(Candidate::fitness).collect();
        let size = self.config.population_size;

        let mut ranked: Vec<usize> = (0..self.population.len()).collect();
        ranked.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

        self.phase = EvolutionPhase::Reproducing;
        let mut next_gen = Vec::with_capacity(size);

        // Elitism: keep best individuals
        for &idx in ranked.iter().take(self.config.ga.elitism.min(size)) {
            let mut elite = self.population[idx].clone();
            elite.generation = self.generation;
            next_gen.push(elite);
        }

        // Fill rest with offspring
        while next_gen.len() < size {
            let idx1 = self.selection.select(&fitness, &mut self.rng);
            let idx2 = self.selection.select(&fitness, &mut self.rng);
            let (parent1, parent2) = (&self.population[idx1], &self.population[idx2]);

            let mut child = if self.rng.chance(self.config.ga.crossover_rate) {
                self.variation
                    .crossover(&parent1.genome, &parent2.genome, &mut self.rng)
            } else {
                parent1.genome.clone()
            };
            self.variation.mutate(&mut child, &mut self.rng);
            genome::repair(
                &mut child,
                self.fsm.input_set().len(),
                self.config.max_uio_length,
                &mut self.rng,
            );

            let parents = vec![parent1.id, parent2.id];
            let id = self.take_id();
            next_gen.push(Candidate {
                id,
                genome: child,
                evaluation: None,
                generation: self.generation,
                parents,
            });
        }

        self.population = next_gen;
    }

    /// Current progress.
    pub fn progress(&self) -> EvolutionProgress {
        EvolutionProgress {
            generation: self.generation.saturating_sub(1),
            total_generations: self.config.generation,
            phase: self.phase,
            best_fitness: self.best_fitness,
            record: self
                .statistics
                .records()
                .last()
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Check if evolution should stop after a merged generation.
    fn should_stop(&self) -> Option<StopReason> {
        if self.config.early_stop && self.registry.is_complete() {
            return Some(StopReason::TargetsCovered);
        }
        if self.generation >= self.config.generation {
            return Some(StopReason::MaxGenerations);
        }
        None
    }

    /// Run evolution with progress callback.
    ///
    /// The callback runs after every merged generation. Cancellation is
    /// checked before each generation starts.
    pub fn run_with_callback<F>(
        &mut self,
        mut callback: F,
    ) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();
        self.initialize();
        info!(
            "Searching UIOs for {} target states: population {}, {} generations, {} workers",
            self.registry.len(),
            self.config.population_size,
            self.config.generation,
            self.scheduler.workers()
        );

        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }

            self.evaluate_generation()?;
            callback(&self.progress());

            if let Some(reason) = self.should_stop() {
                break reason;
            }
            self.reproduce();
        };
        self.phase = EvolutionPhase::Terminated;

        let elapsed = start_time.elapsed().as_secs_f64();
        let total_evaluations = self.generation as u64 * self.config.population_size as u64;
        info!(
            "Stopped after {} generations ({:?}): {}/{} targets discovered",
            self.generation,
            stop_reason,
            self.registry.discovered_count(),
            self.registry.len()
        );

        Ok(EvolutionResult {
            discovered: self.discovered_uios(),
            open_states: self.registry.open().collect(),
            history: self.statistics.records().to_vec(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations,
                best_fitness: self.best_fitness.max(0.0),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                workers: self.scheduler.workers(),
                stop_reason,
            },
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }

    fn discovered_uios(&self) -> Vec<DiscoveredUio> {
        self.registry
            .discovered()
            .map(|(state, discovery)| DiscoveredUio {
                state,
                sequence: discovery
                    .best_uio
                    .as_deref()
                    .map(|uio| self.fsm.render_inputs(uio))
                    .unwrap_or_default(),
                count: discovery.count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::three_state_machine;
    use crate::schema::{DigraphShape, FsmDefaults};

    fn config(population_size: usize, generation: usize) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            generation,
            max_uio_length: 4,
            parallelism_enabled: false,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn random_fsm(states: usize, seed: u64) -> Arc<Fsm> {
        let defaults = FsmDefaults {
            number_of_states: states,
            digraph_shape_selection: DigraphShape::Symmetric,
            ..Default::default()
        };
        let mut rng = GenomeRng::new(seed);
        Arc::new(Fsm::random(&defaults, rng.inner_mut()).unwrap())
    }

    fn all_states(fsm: &Fsm) -> BTreeSet<StateId> {
        (0..fsm.num_states()).collect()
    }

    #[test]
    fn test_evolution_engine_creation() {
        let fsm = Arc::new(three_state_machine());
        let mut engine =
            EvolutionEngine::new(config(10, 5), fsm.clone(), all_states(&fsm)).unwrap();
        engine.initialize();

        assert_eq!(engine.population().len(), 10);
        assert_eq!(engine.phase(), EvolutionPhase::Initialized);
        assert!(engine.population().iter().all(|c| (1..=4).contains(&c.genome.len())));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let fsm = Arc::new(three_state_machine());
        let result = EvolutionEngine::new(config(10, 5), fsm, [0, 3].into());
        assert!(matches!(
            result,
            Err(EvolutionError::Targets(ConfigError::UnknownTargetState { state: 3, .. }))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let fsm = Arc::new(three_state_machine());
        let result = EvolutionEngine::new(config(0, 5), fsm, BTreeSet::new());
        assert!(matches!(
            result,
            Err(EvolutionError::Config(EvolutionConfigError::EmptyPopulation))
        ));
    }

    #[test]
    fn test_runs_exact_generations_without_early_stop() {
        let fsm = random_fsm(20, 3);
        let mut cfg = config(12, 7);
        cfg.early_stop = false;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm)).unwrap();

        let mut seen = Vec::new();
        let result = engine.run_with_callback(|p| seen.push(p.generation)).unwrap();

        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.stats.generations, 7);
        assert_eq!(result.stats.total_evaluations, 7 * 12);
        assert_eq!(result.history.len(), 7);
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
        assert_eq!(engine.phase(), EvolutionPhase::Terminated);
        assert_eq!(engine.population().len(), 12);
    }

    #[test]
    fn test_early_stop_when_targets_covered() {
        let fsm = Arc::new(three_state_machine());
        let seeded = vec![Genome::new(vec![0, 1])];
        let mut engine = EvolutionEngine::new(config(6, 50), fsm.clone(), all_states(&fsm))
            .unwrap()
            .with_initial_population(seeded);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::TargetsCovered);
        assert_eq!(result.stats.generations, 1);
        assert!(result.open_states.is_empty());

        let sequences: Vec<(StateId, String)> = result
            .discovered
            .iter()
            .map(|d| (d.state, d.sequence.concat()))
            .collect();
        assert_eq!(sequences[1], (1, "a".to_string()));
        assert_eq!(sequences[0].0, 0);
        assert!(sequences[0].1.len() <= 2);
    }

    #[test]
    fn test_registry_is_monotone() {
        let fsm = random_fsm(40, 9);
        let mut cfg = config(16, 10);
        cfg.early_stop = false;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm)).unwrap();

        let mut discovered = Vec::new();
        engine
            .run_with_callback(|p| discovered.push((p.record.discovered, p.record.open)))
            .unwrap();

        assert!(discovered.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(discovered.iter().all(|&(d, o)| d + o == 40));
    }

    #[test]
    fn test_worker_failure_aborts_without_merge() {
        let fsm = Arc::new(three_state_machine());
        let seeded = vec![Genome::new(vec![0]), Genome::new(vec![0, 7])];
        let mut engine = EvolutionEngine::new(config(4, 5), fsm.clone(), all_states(&fsm))
            .unwrap()
            .with_initial_population(seeded);

        let result = engine.run();
        assert!(matches!(
            result,
            Err(EvolutionError::Evaluation {
                generation: 0,
                source: EvaluationError::InvalidSymbol { input: 7, .. }
            })
        ));
        assert_eq!(engine.registry().discovered_count(), 0);
        assert!(engine.statistics().records().is_empty());
    }

    #[test]
    fn test_cancellation() {
        let fsm = Arc::new(three_state_machine());
        let mut engine =
            EvolutionEngine::new(config(5, 100), fsm.clone(), all_states(&fsm)).unwrap();
        let cancel = engine.cancel_handle();

        // Cancel immediately
        cancel.store(true, Ordering::Relaxed);

        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 0);
    }

    #[test]
    fn test_cancel_from_callback() {
        let fsm = random_fsm(30, 1);
        let mut cfg = config(8, 100);
        cfg.early_stop = false;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm)).unwrap();
        let cancel = engine.cancel_handle();

        let result = engine
            .run_with_callback(|p| {
                if p.generation == 2 {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let fsm = random_fsm(25, 4);
        let mut cfg = config(20, 6);
        cfg.early_stop = false;

        let mut sequential = EvolutionEngine::new(cfg.clone(), fsm.clone(), all_states(&fsm))
            .unwrap()
            .with_scheduler(EvaluationScheduler::sequential());
        let mut parallel = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm))
            .unwrap()
            .with_scheduler(EvaluationScheduler::with_workers(4).unwrap());

        let a = sequential.run().unwrap();
        let b = parallel.run().unwrap();
        assert_eq!(a.history, b.history);
        assert_eq!(a.discovered, b.discovered);
        assert_eq!(b.stats.workers, 4);
    }

    #[test]
    fn test_genome_length_bound_holds() {
        let fsm = random_fsm(15, 2);
        let mut cfg = config(10, 5);
        cfg.early_stop = false;
        cfg.ga.insertion_rate = 0.9;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm)).unwrap();

        engine.initialize();
        for _ in 0..5 {
            engine.evaluate_generation().unwrap();
            engine.reproduce();
            assert_eq!(engine.population().len(), 10);
            assert!(engine.population().iter().all(|c| (1..=4).contains(&c.genome.len())));
        }
    }

    #[test]
    fn test_repeated_runs_start_fresh() {
        let fsm = Arc::new(three_state_machine());
        let mut cfg = config(6, 3);
        cfg.early_stop = false;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm)).unwrap();

        let first = engine.run().unwrap();
        let second = engine.run().unwrap();

        assert_eq!(second.stats.generations, 3);
        assert_eq!(second.history.len(), 3);
        assert_eq!(
            second.history.iter().map(|r| r.generation).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(first.history, second.history);
        assert_eq!(first.discovered, second.discovered);
        assert_eq!(first.open_states, second.open_states);
        assert_eq!(engine.statistics().records().len(), 3);
    }

    #[test]
    fn test_reproduce_before_initialize_is_noop() {
        let fsm = Arc::new(three_state_machine());
        let mut engine =
            EvolutionEngine::new(config(5, 3), fsm.clone(), all_states(&fsm)).unwrap();

        engine.reproduce();
        assert!(engine.population().is_empty());
        assert_eq!(engine.phase(), EvolutionPhase::Initialized);
    }

    /// Always returns the same genome.
    struct Cloning(Genome);

    impl VariationOperator for Cloning {
        fn crossover(&self, _: &Genome, _: &Genome, _: &mut GenomeRng) -> Genome {
            self.0.clone()
        }

        fn mutate(&self, _: &mut Genome, _: &mut GenomeRng) {}
    }

    #[test]
    fn test_custom_operators() {
        let fsm = Arc::new(three_state_machine());
        let mut cfg = config(5, 3);
        cfg.early_stop = false;
        cfg.ga.crossover_rate = 1.0;
        cfg.ga.elitism = 0;
        let mut engine = EvolutionEngine::new(cfg, fsm.clone(), all_states(&fsm))
            .unwrap()
            .with_selection(Box::new(crate::schema::SelectionMethod::RankBased))
            .with_variation(Box::new(Cloning(Genome::new(vec![1]))));

        engine.initialize();
        engine.evaluate_generation().unwrap();
        engine.reproduce();
        assert!(engine.population().iter().all(|c| c.genome.as_slice() == [1]));
        assert!(engine.population().iter().all(|c| c.parents.len() == 2));
    }
}
