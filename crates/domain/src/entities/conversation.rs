//! Conversation entity - a bounded, ordered sequence of turns
//!
//! Holds the rolling history for one session. System turns are pinned:
//! they never count toward the history limit and are never evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Turn, TurnRole};
use crate::value_objects::SessionId;

/// Default number of non-system turns retained per conversation
pub const DEFAULT_MAX_TURNS: usize = 10;

/// A conversation with bounded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique session identifier
    pub id: SessionId,
    /// Turns in chronological order, pinned system turns first
    turns: Vec<Turn>,
    /// Maximum number of non-system turns retained
    max_turns: usize,
    /// When the conversation started
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation retaining at most `max_turns`
    /// non-system turns
    pub fn new(max_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            turns: Vec::new(),
            max_turns,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new conversation with a pinned system turn
    pub fn with_system_prompt(max_turns: usize, prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new(max_turns);
        conversation.turns.push(Turn::system(prompt));
        conversation
    }

    /// Append a turn, evicting the oldest non-system turns once the
    /// history limit is exceeded. Pinned system turns are kept ahead of
    /// the evictable history and do not count toward the limit.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();

        let excess = self.history_len().saturating_sub(self.max_turns);
        if excess > 0 {
            let mut removed = 0;
            self.turns.retain(|t| {
                if removed < excess && !t.is_pinned() {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
        }
    }

    /// Append a user turn
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Turn::user(text));
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Turn::assistant(text));
    }

    /// Read-only view of the current turns, in order
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Reset to only the pinned system turns
    pub fn clear(&mut self) {
        self.turns.retain(Turn::is_pinned);
        self.updated_at = Utc::now();
    }

    /// Replace the pinned system turn (inserted at the front if absent)
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.turns.retain(|t| !t.is_pinned());
        self.turns.insert(0, Turn::system(prompt));
        self.updated_at = Utc::now();
    }

    /// Total number of turns, pinned included
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Number of non-system turns; this is the bounded quantity
    pub fn history_len(&self) -> usize {
        self.turns.iter().filter(|t| !t.is_pinned()).count()
    }

    /// Whether the conversation holds no turns at all
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The configured history limit
    pub const fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// The last turn, if any
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent user turn, if any
    pub fn last_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == TurnRole::User)
    }

    /// The pinned system prompt text, if present
    pub fn system_prompt(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|t| t.is_pinned())
            .map(|t| t.text.as_str())
    }

    /// Per-role counts and timing for the current state
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            total_turns: self.len(),
            user_turns: self
                .turns
                .iter()
                .filter(|t| t.role == TurnRole::User)
                .count(),
            assistant_turns: self
                .turns
                .iter()
                .filter(|t| t.role == TurnRole::Assistant)
                .count(),
            last_turn_at: self.last_turn().map(|t| t.created_at),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

/// Snapshot of conversation counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Session the summary describes
    pub id: SessionId,
    /// Total turns including pinned system turns
    pub total_turns: usize,
    /// Number of user turns
    pub user_turns: usize,
    /// Number of assistant turns
    pub assistant_turns: usize,
    /// Timestamp of the most recent turn
    pub last_turn_at: Option<DateTime<Utc>>,
}
