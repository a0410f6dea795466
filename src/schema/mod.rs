//! Schema module - Configuration types and the FSM text format.

mod config;
mod evolution;
mod fsm;

pub use config::*;
pub use evolution::*;
pub use fsm::*;
