//! Error types for the ChatPTK domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each stage that can fail has its own error type.

use thiserror::Error;

/// Failures talking to the hosted completion service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A chat request the pipeline refuses before anything is sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Empty message")]
    EmptyMessage,
}
