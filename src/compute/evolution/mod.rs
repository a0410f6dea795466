//! Evolutionary search for unique input/output sequences (UIOs).
//!
//! A UIO for a state is an input sequence whose output trace from that
//! state differs from the trace of every other state. This module evolves
//! candidate input sequences and collects the UIOs they reveal.
//!
//! # Overview
//!
//! - **State splitting** (`sst`): flat distinguishing profiles and adaptive
//!   splitting trees
//! - **Fitness** (`fitness`): weighted score of what a candidate separates
//! - **Genome Operations** (`genome`): random generation, crossover, mutation
//! - **Selection** (`selection`): pluggable parent selection and variation
//! - **Registry** (`registry`): monotone record of discovered target states
//! - **Scheduler** (`scheduler`): fork/join evaluation on a rayon pool
//! - **Statistics** (`statistics`): per-generation records and composites
//! - **Search** (`search`): the generation state machine
//! - **Report** (`report`): JSON export of a finished run
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uio_search::compute::Fsm;
//! use uio_search::compute::evolution::EvolutionEngine;
//! use uio_search::schema::{EvolutionConfig, FsmSpec};
//!
//! let spec = FsmSpec::from_file("machine.txt").unwrap();
//! let fsm = Arc::new(Fsm::from_spec(&spec).unwrap());
//! let targets = (0..fsm.num_states()).collect();
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), fsm, targets).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!(
//!             "Generation {}: {} open",
//!             progress.generation, progress.record.open
//!         );
//!     })
//!     .unwrap();
//!
//! for uio in &result.discovered {
//!     println!("state {}: {}", uio.state, uio.sequence.join(""));
//! }
//! ```

mod fitness;
mod genome;
mod registry;
mod report;
mod scheduler;
mod search;
mod selection;
mod sst;
mod statistics;

pub use fitness::{Evaluation, EvaluationError, FitnessEvaluator};
pub use genome::{GenomeRng, crossover, genome_distance, mutate, repair};
pub use registry::{Discovery, DiscoveryRegistry, RegistrySnapshot};
pub use report::{FsmSummary, RunReport, WindowedStatistics};
pub use scheduler::EvaluationScheduler;
pub use search::{Candidate, EvolutionEngine, EvolutionError};
pub use selection::{SelectionStrategy, SymbolVariation, VariationOperator};
pub use sst::{Distinction, DistinguishingProfile, SplittingTree, TreeNode};
pub use statistics::{UioStatistics, diversity, summarize};
