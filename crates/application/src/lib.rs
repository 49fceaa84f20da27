//! Application layer for Switchboard
//!
//! Wires a conversation to a set of registered model providers: the
//! [`Agent`] serializes exchanges per session, consults the fallback
//! chain when the primary backend cannot answer, and guarantees a reply
//! through the rule-based responder.

pub mod agent;
pub mod config;
pub mod error;
pub mod registry;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::AgentError;
pub use registry::{ProviderRegistry, ProviderStatus};
