//! Business logic and port trait definitions for Reverie.
//!
//! This crate defines the "ports" (repository, cache and oracle traits) that the
//! infrastructure layer implements, plus the services built on them: the quota
//! ledger, the interpretation dispatcher, the push channel registry and the
//! session orchestrator. It depends only on `reverie-types` -- never on
//! `reverie-infra` or any database/IO crate.

pub mod cache;
pub mod chat;
pub mod oracle;
pub mod push;
pub mod quota;
pub mod repository;
pub mod service;
