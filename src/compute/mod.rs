//! Compute module - FSM execution and UIO search.

mod fsm;

pub mod evolution;

pub use fsm::*;
