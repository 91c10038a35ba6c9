//! Error types for the MedTriage domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each failure class of the triage pipeline has its own variant.

use thiserror::Error;

/// The top-level error type for all MedTriage operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller input ---
    #[error("Invalid input: {0}")]
    Validation(String),

    // --- Reasoning engine ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Response decoding ---
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Uploaded image could not be used ---
    #[error("Image error: {0}")]
    Image(String),

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

impl Error {
    /// Whether the failure was caused by the caller's input rather than
    /// by the engine, the store, or the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Event log is corrupted: {0}")]
    Corrupted(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Why a reasoning-engine response could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no structured document found in response")]
    NoDocument,

    #[error("malformed structured document: {reason}")]
    Malformed { reason: String },

    #[error("document does not match the expected record: {reason}")]
    Shape { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn only_validation_is_client_error() {
        assert!(Error::Validation("text too short".into()).is_client_error());
        assert!(!Error::Decode(DecodeError::NoDocument).is_client_error());
        assert!(!Error::Store(StoreError::Storage("disk full".into())).is_client_error());
        assert!(!Error::Provider(ProviderError::Timeout("60s".into())).is_client_error());
    }

    #[test]
    fn decode_error_displays_reason() {
        let err = Error::Decode(DecodeError::Shape {
            reason: "missing field `priority`".into(),
        });
        assert!(err.to_string().contains("priority"));
    }
}
