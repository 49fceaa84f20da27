//! Capability interface implemented by every model backend

use std::pin::Pin;

use async_trait::async_trait;
use domain::Turn;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Which kind of backend a provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Model server on the local machine, reached over loopback HTTP
    LocalDaemon,
    /// Remote inference endpoint
    HostedApi,
    /// Model weights loaded into this process
    InProcess,
    /// Static keyword-matching responder
    RuleBased,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalDaemon => write!(f, "local-daemon"),
            Self::HostedApi => write!(f, "hosted-api"),
            Self::InProcess => write!(f, "in-process"),
            Self::RuleBased => write!(f, "rule-based"),
        }
    }
}

/// A message in a chat request (role/content wire shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.text.clone(),
        }
    }
}

/// Request for one reply given the visible history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Messages in the conversation, oldest first
    pub messages: Vec<PromptMessage>,
    /// Model to use (overrides the provider's configured default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a request from an ordered slice of turns
    pub fn from_turns(turns: &[Turn]) -> Self {
        Self {
            messages: turns.iter().map(PromptMessage::from).collect(),
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Create a single-turn request
    pub fn simple(user_message: impl Into<String>) -> Self {
        Self {
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: user_message.into(),
            }],
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Create a request with a system prompt ahead of the user message
    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                PromptMessage {
                    role: "system".to_string(),
                    content: system.into(),
                },
                PromptMessage {
                    role: "user".to_string(),
                    content: user.into(),
                },
            ],
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the model for this request
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the token budget
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Content of the most recent user message, if any
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// One complete reply from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderReply {
    /// Generated text
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Token usage, if the backend reported it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A piece of an incremental reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyChunk {
    /// Text delta
    pub text: String,
    /// Whether this is the final chunk
    pub done: bool,
    /// Model name, reported on the final chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Type alias for an incremental reply
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ReplyChunk, ProviderError>> + Send>>;

/// Capability implemented by every chat backend
///
/// `is_available` is a cheap pre-check and never errors; "not configured"
/// reads as `false`. `generate` can still fail after a passing pre-check,
/// e.g. when the backend drops the connection mid-request.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Identifier this provider is registered under
    fn id(&self) -> &str;

    /// Which kind of backend this is
    fn kind(&self) -> ProviderKind;

    /// Cheap availability pre-check
    async fn is_available(&self) -> bool;

    /// Produce one complete reply for the given history
    async fn generate(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError>;

    /// Produce an incremental reply for the given history
    async fn generate_stream(&self, request: ChatRequest) -> Result<ReplyStream, ProviderError>;
}
