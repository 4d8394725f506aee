//! Chat session persistence port and the session orchestrator.

pub mod orchestrator;
pub mod repository;
