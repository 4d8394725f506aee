//! Infrastructure layer for Reverie.
//!
//! Contains implementations of the port traits defined in `reverie-core`:
//! SQLite storage for users, tokens and chat sessions, the moka-backed session
//! view cache, the HTTP interpretation oracle client, and the configuration
//! loader.

pub mod cache;
pub mod config;
pub mod oracle;
pub mod sqlite;
