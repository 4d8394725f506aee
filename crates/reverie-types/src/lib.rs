//! Shared domain types for Reverie.
//!
//! This crate contains the core domain types used across the service:
//! users and their quota fields, chat sessions and messages, push events,
//! oracle request shapes, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod oracle;
pub mod user;
