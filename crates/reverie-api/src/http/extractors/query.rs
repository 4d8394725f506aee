//! Query parameter extractors for list and socket endpoints.

use serde::Deserialize;

/// Query parameters for the session list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct SessionListQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, clamped to the configured maximum.
    pub limit: Option<u32>,
}

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize, Default)]
pub struct SocketQuery {
    /// Browsers cannot set headers on a WebSocket handshake, so the token may
    /// arrive here instead.
    pub token: Option<String>,
}
