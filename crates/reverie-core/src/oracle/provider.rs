//! InterpretationOracle trait definition.

use reverie_types::error::OracleError;
use reverie_types::oracle::InterpretRequest;

/// The external generative service, consumed as an opaque request/response API.
///
/// Implementations live in reverie-infra (e.g., `HttpOracle`).
pub trait InterpretationOracle: Send + Sync {
    /// Ask the classifier whether `text` is in-domain (describes a dream).
    fn classify(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<bool, OracleError>> + Send;

    /// Produce an interpretation for the request.
    fn interpret(
        &self,
        request: &InterpretRequest,
    ) -> impl std::future::Future<Output = Result<String, OracleError>> + Send;
}
