//! Interpretation oracle port and the dispatcher that drives it.

pub mod dispatcher;
pub mod provider;

pub use dispatcher::InterpretationDispatcher;
pub use provider::InterpretationOracle;
