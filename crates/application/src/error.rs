//! Application-level errors

use thiserror::Error;

/// Errors surfaced by the application layer
///
/// Provider failures never reach the caller of [`crate::Agent::chat`]:
/// they are absorbed by the fallback chain. The only error the agent can
/// surface is a configuration problem at construction time.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or missing configuration; fatal at construction
    #[error("configuration error: {0}")]
    Configuration(String),
}
