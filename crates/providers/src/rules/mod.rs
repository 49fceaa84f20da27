//! Rule-based responder
//!
//! Pattern-matches the latest user message against a static table of
//! topic keywords and serves a canned reply. Always available, never
//! fails; used as the terminal fallback so a chat call can always be
//! answered.

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use futures::stream;
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::ports::{
    ChatRequest, ModelProvider, ProviderKind, ProviderReply, ReplyChunk, ReplyStream,
};

const MODEL_NAME: &str = "rule-based";

/// One keyword-triggered canned reply
#[derive(Debug, Clone)]
pub struct Rule {
    /// Keywords that trigger this rule (matched case-insensitively,
    /// anywhere in the message)
    pub keywords: Vec<String>,
    /// The canned reply
    pub reply: String,
}

impl Rule {
    /// Create a rule from keyword/reply pairs
    pub fn new<K, S>(keywords: K, reply: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            reply: reply.into(),
        }
    }
}

/// An ordered set of rules plus the reply for unmatched input
///
/// Earlier rules take priority when several match.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default_reply: String,
}

impl RuleSet {
    /// Create a rule set
    pub fn new(rules: Vec<Rule>, default_reply: impl Into<String>) -> Self {
        Self {
            rules,
            default_reply: default_reply.into(),
        }
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(
            vec![
                Rule::new(
                    ["hello", "hey", "good morning", "greetings"],
                    "Hello! How can I help you today?",
                ),
                Rule::new(
                    ["how are you", "how do you feel"],
                    "I'm doing well, thank you for asking! How can I help?",
                ),
                Rule::new(
                    ["thank", "appreciate"],
                    "You're very welcome! Feel free to ask anything else.",
                ),
                Rule::new(
                    ["goodbye", "bye", "farewell", "see you"],
                    "Goodbye! It was great chatting with you.",
                ),
                Rule::new(
                    ["weather"],
                    "I don't have access to live weather data; a weather service will \
                     have current conditions for your area.",
                ),
                Rule::new(
                    ["time", "clock"],
                    "I can't see a clock from here; your device will have the \
                     current time.",
                ),
                Rule::new(
                    ["your name", "who are you"],
                    "I'm a small rule-based assistant that steps in when no model \
                     backend is reachable.",
                ),
                Rule::new(
                    ["help"],
                    "Ask me a question and I'll do my best with the answers I have \
                     on hand.",
                ),
            ],
            "I don't have a good answer for that right now, but I'm happy to try \
             another question.",
        )
    }
}

/// Provider serving canned replies from a keyword table
#[derive(Debug)]
pub struct RuleBasedProvider {
    id: String,
    rules: RuleSet,
    automaton: AhoCorasick,
    /// Maps automaton pattern index to rule index
    rule_of_pattern: Vec<usize>,
}

impl RuleBasedProvider {
    /// Create a provider over the given rule set
    pub fn new(rules: RuleSet) -> Self {
        let mut patterns = Vec::new();
        let mut rule_of_pattern = Vec::new();
        for (index, rule) in rules.rules.iter().enumerate() {
            for keyword in &rule.keywords {
                patterns.push(keyword.as_str());
                rule_of_pattern.push(index);
            }
        }

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .unwrap_or_else(|e| unreachable!("static keyword table failed to compile: {e}"));

        Self {
            id: "rule-based".to_string(),
            rules,
            automaton,
            rule_of_pattern,
        }
    }

    /// Create a provider with the built-in rule table
    pub fn with_defaults() -> Self {
        Self::new(RuleSet::default())
    }

    /// Override the registry identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Produce the canned reply for a message. Infallible; rule order is
    /// the priority when several keywords match.
    pub fn reply_to(&self, message: &str) -> &str {
        let matched = self
            .automaton
            .find_iter(message)
            .map(|m| self.rule_of_pattern[m.pattern().as_usize()])
            .min();

        match matched {
            Some(rule_index) => {
                debug!(rule = rule_index, "Matched canned reply");
                &self.rules.rules[rule_index].reply
            },
            None => &self.rules.default_reply,
        }
    }

    fn reply_for_request(&self, request: &ChatRequest) -> ProviderReply {
        let message = request.last_user_message().unwrap_or_default();
        ProviderReply {
            text: self.reply_to(message).to_string(),
            model: MODEL_NAME.to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for RuleBasedProvider {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl ModelProvider for RuleBasedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::RuleBased
    }

    async fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip(self, request))]
    async fn generate(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        Ok(self.reply_for_request(&request))
    }

    #[instrument(skip(self, request))]
    async fn generate_stream(&self, request: ChatRequest) -> Result<ReplyStream, ProviderError> {
        let reply = self.reply_for_request(&request);
        Ok(Box::pin(stream::once(async move {
            Ok(ReplyChunk {
                text: reply.text,
                done: true,
                model: Some(reply.model),
            })
        })))
    }
}
