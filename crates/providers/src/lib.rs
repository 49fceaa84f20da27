//! Model provider layer for Switchboard
//!
//! Defines the capability interface every chat backend implements, plus the
//! four concrete variants: an Ollama-compatible local daemon, an
//! OpenAI-compatible hosted API, an in-process model host, and the
//! rule-based responder used as the terminal fallback.

pub mod config;
pub mod daemon;
pub mod error;
pub mod hosted;
pub mod in_process;
pub mod ports;
pub mod rules;

pub use config::{DaemonConfig, HostedConfig};
pub use daemon::LocalDaemonProvider;
pub use error::ProviderError;
pub use hosted::HostedApiProvider;
pub use in_process::{CompletionModel, InProcessProvider};
pub use ports::{
    ChatRequest, ModelProvider, PromptMessage, ProviderKind, ProviderReply, ReplyChunk,
    ReplyStream, TokenUsage,
};
pub use rules::{Rule, RuleBasedProvider, RuleSet};
