//! UIO search - Evolutionary discovery of unique input/output sequences.
//!
//! A unique input/output sequence (UIO) for a state of a deterministic
//! finite state machine is an input sequence whose outputs from that state
//! differ from the outputs of every other state. UIOs are the building
//! blocks of conformance test sequences.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Run parameters, the FSM text format, and result types
//! - `compute`: FSM execution, state splitting, and the genetic search
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uio_search::{
//!     compute::{Fsm, evolution::EvolutionEngine},
//!     schema::{EvolutionConfig, FsmDefaults},
//! };
//! use rand::SeedableRng;
//!
//! // Random symmetric machine with 100 states
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let fsm = Arc::new(Fsm::random(&FsmDefaults::default(), &mut rng).unwrap());
//! let targets = (0..fsm.num_states()).collect();
//!
//! let mut engine = EvolutionEngine::new(EvolutionConfig::default(), fsm, targets).unwrap();
//! let result = engine.run().unwrap();
//!
//! println!(
//!     "{} UIOs after {} generations",
//!     result.discovered.len(),
//!     result.stats.generations
//! );
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, EvolutionError, RunReport};
pub use compute::{Fsm, Simulator, Trace};
pub use schema::{EvolutionConfig, FsmSpec};
