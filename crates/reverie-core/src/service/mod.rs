//! Business services (use cases).

pub mod account;
