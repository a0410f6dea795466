//! Evolution configuration types for automated UIO discovery.
//!
//! The top-level [`EvolutionConfig`] mirrors the run parameters file
//! (PascalCase keys). Operator settings live under `GA`, fitness weights
//! under `Fitness`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, FsmConfig, InputId, StateId};

/// Top-level run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EvolutionConfig {
    /// Number of candidates per generation.
    pub population_size: usize,
    /// Maximum number of generations.
    pub generation: usize,
    /// Maximum genome (candidate UIO) length.
    #[serde(rename = "MaxUIOLength")]
    pub max_uio_length: usize,
    /// Evaluate candidates on a thread pool.
    #[serde(default = "default_parallelism")]
    pub parallelism_enabled: bool,
    /// Worker threads per CPU when parallelism is enabled.
    #[serde(default = "default_threads_per_cpu", rename = "NumberOfThreadsPerCPU")]
    pub number_of_threads_per_cpu: usize,
    /// Machine under test.
    #[serde(default, rename = "FSM")]
    pub fsm: FsmConfig,
    /// Keep windowed statistics in the run report.
    #[serde(default = "default_statistics_enabled")]
    pub statistics_enabled: bool,
    /// Statistics window `(from, interval)`; `interval = null` means
    /// every generation from `from` onwards.
    #[serde(default)]
    pub statistics_gen_interval: (usize, Option<usize>),
    /// Stop as soon as every target state has a UIO.
    #[serde(default = "default_early_stop")]
    pub early_stop: bool,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Genetic operator settings.
    #[serde(default, rename = "GA")]
    pub ga: GeneticAlgorithmConfig,
    /// Fitness weights.
    #[serde(default)]
    pub fitness: FitnessConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generation: 50,
            max_uio_length: 6,
            parallelism_enabled: default_parallelism(),
            number_of_threads_per_cpu: default_threads_per_cpu(),
            fsm: FsmConfig::default(),
            statistics_enabled: default_statistics_enabled(),
            statistics_gen_interval: (0, None),
            early_stop: default_early_stop(),
            random_seed: None,
            ga: GeneticAlgorithmConfig::default(),
            fitness: FitnessConfig::default(),
        }
    }
}

fn default_parallelism() -> bool {
    true
}
fn default_threads_per_cpu() -> usize {
    1
}
fn default_statistics_enabled() -> bool {
    true
}
fn default_early_stop() -> bool {
    true
}

/// Genetic Algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneticAlgorithmConfig {
    /// Selection method.
    #[serde(default)]
    pub selection: SelectionMethod,
    /// Crossover probability (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    /// Crossover operator.
    #[serde(default)]
    pub crossover: CrossoverMethod,
    /// Per-symbol replacement probability (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
    /// Per-symbol insertion probability (0.0-1.0).
    #[serde(default = "default_indel_rate")]
    pub insertion_rate: f32,
    /// Per-symbol deletion probability (0.0-1.0).
    #[serde(default = "default_indel_rate")]
    pub deletion_rate: f32,
    /// Elitism: number of best individuals to preserve unchanged.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// How a genome is interpreted when distinguishing states.
    #[serde(default)]
    pub shape: CandidateShape,
}

impl Default for GeneticAlgorithmConfig {
    fn default() -> Self {
        Self {
            selection: SelectionMethod::default(),
            crossover_rate: default_crossover_rate(),
            crossover: CrossoverMethod::default(),
            mutation_rate: default_mutation_rate(),
            insertion_rate: default_indel_rate(),
            deletion_rate: default_indel_rate(),
            elitism: default_elitism(),
            shape: CandidateShape::default(),
        }
    }
}

fn default_crossover_rate() -> f32 {
    0.8
}
fn default_mutation_rate() -> f32 {
    0.1
}
fn default_indel_rate() -> f32 {
    0.02
}
fn default_elitism() -> usize {
    2
}

/// Selection method for genetic algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method")]
pub enum SelectionMethod {
    /// Tournament selection with configurable size.
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
    },
    /// Rank-based selection.
    RankBased,
    /// Roulette wheel (fitness-proportionate) selection.
    RouletteWheel,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament {
            size: default_tournament_size(),
        }
    }
}

fn default_tournament_size() -> usize {
    3
}

/// Crossover operator for symbol genomes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CrossoverMethod {
    /// One cut point in each parent; head of the first, tail of the second.
    #[default]
    OnePoint,
    /// Splice the middle segment of the second parent into the first.
    TwoPoint,
    /// Pick each position from either parent.
    Uniform,
}

/// How a genome is turned into a distinguishing structure.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CandidateShape {
    /// Preset sequence applied from every state.
    #[default]
    Flat,
    /// Adaptive splitting tree, genes consumed breadth-first.
    Adaptive,
}

/// Fitness weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FitnessConfig {
    /// Weight per still-open target state the candidate distinguishes.
    #[serde(default = "default_discovery_weight")]
    pub discovery_weight: f32,
    /// Weight of the fraction of states the candidate distinguishes.
    #[serde(default = "default_uio_weight")]
    pub uio_weight: f32,
    /// Weight of the inverse genome length.
    #[serde(default = "default_brevity_weight")]
    pub brevity_weight: f32,
    /// Weight of the fraction of distinct output observations.
    #[serde(default = "default_breadth_weight")]
    pub breadth_weight: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            discovery_weight: default_discovery_weight(),
            uio_weight: default_uio_weight(),
            brevity_weight: default_brevity_weight(),
            breadth_weight: default_breadth_weight(),
        }
    }
}

fn default_discovery_weight() -> f32 {
    10.0
}
fn default_uio_weight() -> f32 {
    1.0
}
fn default_brevity_weight() -> f32 {
    0.5
}
fn default_breadth_weight() -> f32 {
    1.0
}

// ============================================================================
// Genome
// ============================================================================

/// Candidate input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Genome {
    pub inputs: Vec<InputId>,
}

impl Genome {
    pub fn new(inputs: Vec<InputId>) -> Self {
        Self { inputs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[InputId] {
        &self.inputs
    }
}

impl From<Vec<InputId>> for Genome {
    fn from(inputs: Vec<InputId>) -> Self {
        Self { inputs }
    }
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Phase of the generation state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Population created, nothing evaluated yet.
    #[default]
    Initialized,
    /// Candidates are being scored by the workers.
    Evaluating,
    /// Coordinator is folding discoveries into the registry.
    Merging,
    /// Parents are being chosen.
    Selecting,
    /// Offspring are being created.
    Reproducing,
    /// Run finished.
    Terminated,
}

/// Aggregate metrics of one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Generation index.
    pub generation: usize,
    pub fitness_max: f32,
    pub fitness_min: f32,
    pub fitness_mean: f32,
    /// Sample standard deviation (0 for a single candidate).
    pub fitness_stdev: f32,
    /// Mean pairwise edit distance between genomes.
    pub diversity: f32,
    /// `number_of_uios -> number of candidates` achieving it.
    pub uio_distribution: BTreeMap<usize, usize>,
    /// Rendered UIO -> number of times it was found this generation.
    pub uio_frequencies: BTreeMap<String, usize>,
    /// Target states discovered after merging this generation.
    pub discovered: usize,
    /// Target states still open after merging this generation.
    pub open: usize,
}

/// Progress update sent after every generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generation just completed.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Current phase.
    pub phase: EvolutionPhase,
    /// Best fitness seen so far.
    pub best_fitness: f32,
    /// Record of the generation just completed.
    pub record: GenerationRecord,
}

/// A discovered UIO, rendered for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUio {
    pub state: StateId,
    /// Input symbols of the shortest UIO found.
    pub sequence: Vec<String>,
    /// How many times the state was distinguished over the run.
    pub count: usize,
}

/// Final result of an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Discovered UIOs ordered by state.
    pub discovered: Vec<DiscoveredUio>,
    /// Target states without a UIO.
    pub open_states: Vec<StateId>,
    /// Per-generation records ordered by generation index.
    pub history: Vec<GenerationRecord>,
    /// Statistics from the run.
    pub stats: EvolutionStats,
}

/// Statistics from an evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Generations evaluated.
    pub generations: usize,
    /// Total candidate evaluations performed.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f32,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Evaluation workers used.
    pub workers: usize,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Every target state has a UIO.
    TargetsCovered,
    /// Cancelled between generations.
    Cancelled,
}

// ============================================================================
// Validation
// ============================================================================

/// Run parameter validation errors.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionConfigError {
    #[error("Population size must be at least 1")]
    EmptyPopulation,
    #[error("Generation count must be at least 1")]
    NoGenerations,
    #[error("Max UIO length must be at least 1")]
    ZeroMaxLength,
    #[error("Threads per CPU must be at least 1")]
    NoThreads,
    #[error("Tournament size must be at least 1")]
    EmptyTournament,
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("{name} must be non-negative, got {value}")]
    InvalidWeight { name: &'static str, value: f32 },
    #[error("Machine configuration failed: {0}")]
    Fsm(#[from] ConfigError),
}

impl EvolutionConfig {
    /// Load run parameters from a JSON file.
    ///
    /// Relative machine and target paths are resolved against the file's
    /// directory. The result is not validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.fsm.resolve_paths(base);
        }
        Ok(config)
    }

    /// Validate run parameters.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        self.fsm.validate()?;

        if self.population_size == 0 {
            return Err(EvolutionConfigError::EmptyPopulation);
        }
        if self.generation == 0 {
            return Err(EvolutionConfigError::NoGenerations);
        }
        if self.max_uio_length == 0 {
            return Err(EvolutionConfigError::ZeroMaxLength);
        }
        if self.parallelism_enabled && self.number_of_threads_per_cpu == 0 {
            return Err(EvolutionConfigError::NoThreads);
        }
        if let SelectionMethod::Tournament { size: 0 } = self.ga.selection {
            return Err(EvolutionConfigError::EmptyTournament);
        }

        let check_rate = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.ga.crossover_rate, "CrossoverRate")?;
        check_rate(self.ga.mutation_rate, "MutationRate")?;
        check_rate(self.ga.insertion_rate, "InsertionRate")?;
        check_rate(self.ga.deletion_rate, "DeletionRate")?;

        let check_weight = |value: f32, name: &'static str| {
            if value >= 0.0 {
                Ok(())
            } else {
                Err(EvolutionConfigError::InvalidWeight { name, value })
            }
        };
        check_weight(self.fitness.discovery_weight, "DiscoveryWeight")?;
        check_weight(self.fitness.uio_weight, "UioWeight")?;
        check_weight(self.fitness.brevity_weight, "BrevityWeight")?;
        check_weight(self.fitness.breadth_weight, "BreadthWeight")?;

        Ok(())
    }

    /// Generation indices covered by the statistics window.
    pub fn statistics_window(&self) -> std::ops::Range<usize> {
        let (from, interval) = self.statistics_gen_interval;
        let from = from.min(self.generation);
        let len = interval.unwrap_or(self.generation);
        from..(from.saturating_add(len)).min(self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{"PopulationSize": 20, "Generation": 5, "MaxUIOLength": 4}"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.population_size, 20);
        assert!(config.parallelism_enabled);
        assert!(config.early_stop);
        assert_eq!(config.ga.selection, SelectionMethod::Tournament { size: 3 });
        assert_eq!(config.ga.elitism, 2);
        assert_eq!(config.fitness.discovery_weight, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_json() {
        let json = r#"{
            "PopulationSize": 30,
            "Generation": 10,
            "MaxUIOLength": 5,
            "ParallelismEnabled": false,
            "NumberOfThreadsPerCPU": 4,
            "FSM": {"FSMDefault": {"NumberOfStates": 12, "InputSet": ["a", "b"]}},
            "StatisticsGenInterval": [2, 3],
            "GA": {"Selection": {"method": "RankBased"}, "Crossover": "TwoPoint", "Shape": "Adaptive"},
            "Fitness": {"BrevityWeight": 0.0}
        }"#;
        let config: EvolutionConfig = serde_json::from_str(json).unwrap();
        assert!(!config.parallelism_enabled);
        assert_eq!(config.fsm.fsm_default.number_of_states, 12);
        assert_eq!(config.ga.selection, SelectionMethod::RankBased);
        assert_eq!(config.ga.crossover, CrossoverMethod::TwoPoint);
        assert_eq!(config.ga.shape, CandidateShape::Adaptive);
        assert_eq!(config.fitness.brevity_weight, 0.0);
        assert_eq!(config.statistics_window(), 2..5);
    }

    #[test]
    fn test_missing_required_fields() {
        let json = r#"{"PopulationSize": 20}"#;
        assert!(serde_json::from_str::<EvolutionConfig>(json).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let config = EvolutionConfig {
            population_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::EmptyPopulation)
        ));

        let mut config = EvolutionConfig::default();
        config.ga.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidRate {
                name: "MutationRate",
                ..
            })
        ));

        let mut config = EvolutionConfig::default();
        config.ga.selection = SelectionMethod::Tournament { size: 0 };
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::EmptyTournament)
        ));

        let mut config = EvolutionConfig::default();
        config.fsm.fsm_default.number_of_states = 0;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::Fsm(ConfigError::NoStates))
        ));
    }

    #[test]
    fn test_statistics_window() {
        let mut config = EvolutionConfig {
            generation: 10,
            ..Default::default()
        };
        assert_eq!(config.statistics_window(), 0..10);

        config.statistics_gen_interval = (7, None);
        assert_eq!(config.statistics_window(), 7..10);

        config.statistics_gen_interval = (8, Some(5));
        assert_eq!(config.statistics_window(), 8..10);

        config.statistics_gen_interval = (12, Some(1));
        assert_eq!(config.statistics_window(), 10..10);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parms.json");
        fs::write(
            &path,
            r#"{"PopulationSize": 8, "Generation": 2, "MaxUIOLength": 3,
                "FSM": {"File": "machine.txt", "UIOSet": "targets.json"}}"#,
        )
        .unwrap();

        let config = EvolutionConfig::from_file(&path).unwrap();
        assert_eq!(config.fsm.file, Some(dir.path().join("machine.txt")));
        assert_eq!(config.fsm.uio_set, Some(dir.path().join("targets.json")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EvolutionConfig::from_file("/nonexistent/parms.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
