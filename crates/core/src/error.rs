//! Error types for the docq domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The four request-fatal
//! conditions are first-class variants so callers handle each explicitly
//! instead of matching on strings or unwinding.

use thiserror::Error;

/// The top-level error type for all docq operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied message carried a role other than user/assistant.
    #[error("invalid message role: '{role}' (only 'user' and 'assistant' are accepted)")]
    InvalidRole { role: String },

    /// Moderation flagged at least one message. Raised before any
    /// embedding or completion cost is incurred.
    #[error("message content was rejected by moderation")]
    ContentRejected,

    /// Even the minimal request (preamble + latest question) exceeds the
    /// model's context window. Terminal — never downgraded to an
    /// empty-context answer.
    #[error("request cannot fit the model context window ({needed} tokens needed, {available} available)")]
    BudgetExhausted { needed: usize, available: usize },

    /// An external capability call failed or returned malformed data.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Configuration errors ---
    #[error("configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures from the external collaborators (completion, embedding,
/// moderation, vector index). No automatic retry anywhere — absence of
/// retry is deliberate.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("capability not configured: {0}")]
    NotConfigured(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}
