//! Error types for the Hindsight domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::id::TurnId;
use thiserror::Error;

/// The top-level error type for all Hindsight operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Upstream gateway errors (embedding / chat completion) ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Vector store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Session ledger errors ---
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // --- Lookup failures surfaced to the caller ---
    #[error("Turn not found: {0}")]
    TurnNotFound(TurnId),

    // --- A tool call the model produced that cannot be executed ---
    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    // --- Caller-supplied argument validation ---
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is an upstream-unavailability failure (embedding
    /// gateway, chat gateway, or vector store down). These are retried with
    /// bounded backoff before being surfaced as a request failure.
    pub fn is_upstream_unavailable(&self) -> bool {
        match self {
            Error::Gateway(g) => g.is_retryable(),
            Error::Store(StoreError::Unavailable(_)) => true,
            Error::Store(StoreError::QueryFailed(_)) => true,
            _ => false,
        }
    }
}

// --- Bounded context errors ---

/// Errors from the remote embedding / chat-completion gateways.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl GatewayError {
    /// Transient failures worth retrying with backoff. Auth and
    /// configuration problems are permanent and fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_)
            | GatewayError::Timeout(_)
            | GatewayError::RateLimited { .. }
            | GatewayError::StreamInterrupted(_) => true,
            GatewayError::ApiError { status_code, .. } => *status_code >= 500,
            GatewayError::AuthenticationFailed(_) | GatewayError::NotConfigured(_) => false,
        }
    }
}

/// Errors from the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Errors from the session ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Cannot append to archived session: {0}")]
    SessionArchived(String),

    #[error("Refusing to persist empty {0} content")]
    EmptyContent(&'static str),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_displays_correctly() {
        let err = Error::Gateway(GatewayError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(GatewayError::ApiError {
            status_code: 503,
            message: "down".into()
        }
        .is_retryable());
        assert!(GatewayError::Network("refused".into()).is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!GatewayError::ApiError {
            status_code: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!GatewayError::AuthenticationFailed("bad key".into()).is_retryable());
    }

    #[test]
    fn upstream_unavailable_classification() {
        assert!(Error::Store(StoreError::Unavailable("conn".into())).is_upstream_unavailable());
        assert!(!Error::MalformedToolCall("x".into()).is_upstream_unavailable());
        assert!(!Error::TurnNotFound(TurnId::new()).is_upstream_unavailable());
    }

    #[test]
    fn ledger_error_displays_correctly() {
        let err = Error::Ledger(LedgerError::SessionArchived("abc".into()));
        assert!(err.to_string().contains("archived"));
    }
}
