//! Push channel registry: directed and broadcast delivery of push events.

pub mod registry;

pub use registry::{ConnectionId, PushRegistry};
