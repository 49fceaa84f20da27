//! Conversation turn entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the turn author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// Turn written by the user
    User,
    /// Turn produced by a model provider
    Assistant,
    /// System instruction, pinned in the conversation
    System,
}

impl TurnRole {
    /// Wire-format name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A single turn in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier
    pub id: Uuid,
    /// Role of the author
    pub role: TurnRole,
    /// Turn text
    pub text: String,
    /// When the turn was created
    pub created_at: DateTime<Utc>,
    /// Optional metadata (provider used, tokens, latency)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

/// Optional metadata recorded on assistant turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Provider that produced this turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model that generated the text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Total tokens consumed, if the backend reported usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    /// Generation latency in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl Turn {
    /// Create a new user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text)
    }

    /// Create a new assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }

    /// Create a new system turn
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, text)
    }

    fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Attach metadata to the turn
    #[must_use]
    pub fn with_metadata(mut self, metadata: TurnMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this turn is pinned (exempt from history eviction)
    pub fn is_pinned(&self) -> bool {
        self.role == TurnRole::System
    }
}
