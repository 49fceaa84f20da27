//! Provider errors

use thiserror::Error;

/// Errors a model provider can return from `generate`
///
/// Every variant is recoverable at the agent level: the fallback chain is
/// consulted regardless of which variant occurred. The split matters for
/// logging and for callers driving a provider directly:
/// [`ProviderError::is_unavailable`] distinguishes "backend cannot serve
/// right now" from "backend answered badly".
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Backend unreachable or not ready to serve
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// In-process model weights not loaded
    #[error("model not loaded: {0}")]
    NotLoaded(String),

    /// Request exceeded its deadline
    #[error("request timed out")]
    TimedOut,

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Backend reachable but reported an error status
    #[error("backend returned status {status}: {body}")]
    ErrorStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Response could not be parsed
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Streaming response broke mid-flight
    #[error("stream error: {0}")]
    StreamFailed(String),
}

impl ProviderError {
    /// Whether this error means the backend could not serve at all
    /// (as opposed to serving an error)
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::NotLoaded(_) | Self::TimedOut
        )
    }

    /// Classify an HTTP error status: 429 is rate limiting, 5xx means the
    /// backend cannot serve, remaining 4xx are backend-reported errors.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            Self::RateLimited
        } else if status >= 500 {
            Self::Unavailable(format!("status {status}: {body}"))
        } else {
            Self::ErrorStatus { status, body }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimedOut
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
