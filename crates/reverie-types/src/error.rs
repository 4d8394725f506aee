use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::oracle::FieldViolation;

/// Errors from repository operations (used by trait definitions in reverie-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the outbound interpretation oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle request timed out")]
    Timeout,

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle rejected the request: {0:?}")]
    Validation(Vec<FieldViolation>),

    #[error("invalid oracle response: {0}")]
    Deserialization(String),
}

/// Errors from the advisory session cache. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Why the quota ledger refused an interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDenial {
    /// Free tier: allowance used up and the cooldown has not lapsed yet.
    CooldownActive { available_at: DateTime<Utc> },
    /// Premium tier: today's allowance is used up until the next reset.
    AllowanceExhausted,
}

impl QuotaDenial {
    /// Actionable message shown to the user.
    pub fn hint(&self) -> String {
        match self {
            QuotaDenial::CooldownActive { available_at } => format!(
                "You have used all of your free interpretations. The next free one \
                 is available after {}, or upgrade to premium for more.",
                available_at.format("%Y-%m-%d %H:%M UTC")
            ),
            QuotaDenial::AllowanceExhausted => {
                "You have used all of today's interpretations. Your allowance renews \
                 with the daily reset."
                    .to_string()
            }
        }
    }
}

/// Fixed message returned for any oracle failure.
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "Interpretation is temporarily unavailable. Please try again later.";

/// Boundary error taxonomy of the chat orchestrator.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no interpretations available")]
    AdmissionDenied { reason: QuotaDenial, hint: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Ownership mismatch or banned account. Deliberately carries no detail.
    #[error("access denied")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{}", UPSTREAM_UNAVAILABLE_MESSAGE)]
    UpstreamUnavailable,

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    pub fn denied(reason: QuotaDenial) -> Self {
        let hint = reason.hint();
        ChatError::AdmissionDenied { reason, hint }
    }

    /// Message safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::AdmissionDenied { hint, .. } => hint.clone(),
            ChatError::Storage(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for ChatError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ChatError::NotFound("entity"),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

/// Errors from account (identity and subscription) operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user not found")]
    NotFound,

    #[error("external id '{0}' already registered")]
    ExternalIdConflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AccountError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AccountError::NotFound,
            RepositoryError::Conflict(msg) => AccountError::ExternalIdConflict(msg),
            other => AccountError::Storage(other.to_string()),
        }
    }
}
