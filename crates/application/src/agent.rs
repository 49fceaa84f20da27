//! Chat agent
//!
//! Orchestrates one session: appends the user turn, asks the primary
//! provider for a reply, walks the fallback chain when it cannot answer,
//! and falls back to the rule-based responder as the last resort so a
//! chat call always terminates in a reply.

use std::sync::Arc;
use std::time::Instant;

use domain::{Conversation, ConversationSummary, SessionId, Turn, TurnMetadata};
use providers::{ChatRequest, ModelProvider, ProviderError, ProviderReply, RuleBasedProvider};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::registry::ProviderRegistry;

/// A chat agent bound to one conversation
///
/// One `chat` call completes, appending both turns, before the next is
/// accepted for the same session; history mutation is never concurrent
/// within a session. Agents for different sessions are independent and
/// may share a registry.
pub struct Agent {
    config: AgentConfig,
    /// Primary plus fallback providers, resolved at construction,
    /// deduplicated, in attempt order
    chain: Vec<Arc<dyn ModelProvider>>,
    /// Terminal responder; always available
    last_resort: RuleBasedProvider,
    conversation: Mutex<Conversation>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chain: Vec<&str> = self.chain.iter().map(|p| p.id()).collect();
        f.debug_struct("Agent")
            .field("chain", &chain)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent for a new session
    ///
    /// Fails with [`AgentError::Configuration`] when the primary or any
    /// fallback identifier is not registered, or when a generation
    /// parameter is out of range. No provider is contacted here.
    pub fn new(registry: &ProviderRegistry, config: AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;

        let mut chain: Vec<Arc<dyn ModelProvider>> = Vec::new();
        for id in std::iter::once(&config.primary).chain(config.fallback_chain.iter()) {
            let provider = registry.get(id).ok_or_else(|| {
                AgentError::Configuration(format!(
                    "unknown provider '{id}' (registered: {:?})",
                    registry.ids()
                ))
            })?;
            if !chain.iter().any(|p| p.id() == id) {
                chain.push(provider);
            }
        }

        let conversation = match &config.system_prompt {
            Some(prompt) => Conversation::with_system_prompt(config.max_history_turns, prompt),
            None => Conversation::new(config.max_history_turns),
        };

        info!(
            session = %conversation.id,
            primary = %config.primary,
            fallbacks = config.fallback_chain.len(),
            "Agent ready"
        );

        Ok(Self {
            config,
            chain,
            last_resort: RuleBasedProvider::with_defaults(),
            conversation: Mutex::new(conversation),
        })
    }

    /// Handle one exchange: returns the assistant turn that was appended
    ///
    /// Never fails; when every configured provider is exhausted the
    /// rule-based responder answers.
    #[instrument(skip(self, user_text))]
    pub async fn chat(&self, user_text: impl Into<String> + Send) -> Turn {
        let mut conversation = self.conversation.lock().await;
        conversation.push_user(user_text);

        let request = ChatRequest::from_turns(conversation.snapshot())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let start = Instant::now();
        let (reply, provider_id) = self.generate_with_fallback(&request).await;
        let latency = start.elapsed().as_millis() as u64;

        debug!(
            provider = %provider_id,
            model = %reply.model,
            latency_ms = latency,
            "Reply generated"
        );

        let turn = Turn::assistant(reply.text).with_metadata(TurnMetadata {
            provider: Some(provider_id),
            model: Some(reply.model),
            tokens: reply.usage.map(|u| u.total_tokens),
            latency_ms: Some(latency),
        });
        conversation.push(turn.clone());
        turn
    }

    /// Try each provider in the chain once, in order; fall back to the
    /// rule-based responder when the chain is exhausted.
    async fn generate_with_fallback(&self, request: &ChatRequest) -> (ProviderReply, String) {
        for provider in &self.chain {
            if !provider.is_available().await {
                debug!(provider = %provider.id(), "Provider unavailable, skipping");
                continue;
            }

            match self.call_provider(provider.as_ref(), request.clone()).await {
                Ok(reply) => return (reply, provider.id().to_string()),
                Err(e) => {
                    warn!(
                        provider = %provider.id(),
                        error = %e,
                        unavailable = e.is_unavailable(),
                        "Provider failed, trying next"
                    );
                },
            }
        }

        debug!("Provider chain exhausted, using rule-based responder");
        let message = request.last_user_message().unwrap_or_default();
        let reply = ProviderReply {
            text: self.last_resort.reply_to(message).to_string(),
            model: "rule-based".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        };
        (reply, self.last_resort.id().to_string())
    }

    /// One provider attempt, bounded by the configured deadline. An
    /// elapsed deadline aborts the in-flight call and reads as the
    /// provider being unavailable.
    async fn call_provider(
        &self,
        provider: &dyn ModelProvider,
        request: ChatRequest,
    ) -> Result<ProviderReply, ProviderError> {
        match self.config.provider_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, provider.generate(request))
                .await
                .map_err(|_| ProviderError::TimedOut)?,
            None => provider.generate(request).await,
        }
    }

    /// Reset the conversation to only the pinned system turn
    pub async fn reset(&self) {
        let mut conversation = self.conversation.lock().await;
        conversation.clear();
        info!(session = %conversation.id, "Conversation reset");
    }

    /// The session this agent serves
    pub async fn session_id(&self) -> SessionId {
        self.conversation.lock().await.id
    }

    /// A copy of the current turns, in order
    pub async fn history(&self) -> Vec<Turn> {
        self.conversation.lock().await.snapshot().to_vec()
    }

    /// Counts for the current conversation state
    pub async fn summary(&self) -> ConversationSummary {
        self.conversation.lock().await.summary()
    }

    /// The configuration this agent was constructed with
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use domain::TurnRole;
    use providers::{ProviderKind, ReplyStream};

    use super::*;

    /// What a scripted provider does when `generate` is called
    enum Behavior {
        Reply(&'static str),
        Unavailable,
        BackendError,
        Stall(Duration),
    }

    /// Hand-rolled provider for exercising the fallback chain
    struct ScriptedProvider {
        id: String,
        available: bool,
        behavior: Behavior,
        generate_calls: AtomicUsize,
        call_log: Arc<StdMutex<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(id: &str, behavior: Behavior, call_log: Arc<StdMutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                available: true,
                behavior,
                generate_calls: AtomicUsize::new(0),
                call_log,
            })
        }

        fn reporting_unavailable(
            id: &str,
            call_log: Arc<StdMutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                available: false,
                behavior: Behavior::Reply("should never be called"),
                generate_calls: AtomicUsize::new(0),
                call_log,
            })
        }

        fn calls(&self) -> usize {
            self.generate_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::LocalDaemon
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(&self, _request: ChatRequest) -> Result<ProviderReply, ProviderError> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.call_log
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(self.id.clone());

            match &self.behavior {
                Behavior::Reply(text) => Ok(ProviderReply {
                    text: (*text).to_string(),
                    model: format!("{}-model", self.id),
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                }),
                Behavior::Unavailable => {
                    Err(ProviderError::Unavailable("scripted outage".to_string()))
                },
                Behavior::BackendError => Err(ProviderError::ErrorStatus {
                    status: 400,
                    body: "scripted backend error".to_string(),
                }),
                Behavior::Stall(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(ProviderReply {
                        text: "too late".to_string(),
                        model: format!("{}-model", self.id),
                        usage: None,
                        finish_reason: Some("stop".to_string()),
                    })
                },
            }
        }

        async fn generate_stream(
            &self,
            _request: ChatRequest,
        ) -> Result<ReplyStream, ProviderError> {
            Err(ProviderError::StreamFailed("not scripted".to_string()))
        }
    }

    fn registry_of(providers: &[Arc<ScriptedProvider>]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(Arc::clone(provider) as Arc<dyn ModelProvider>);
        }
        registry
    }

    fn call_log() -> Arc<StdMutex<Vec<String>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn primary_success_short_circuits_fallbacks() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("ok"), Arc::clone(&log));
        let fallback = ScriptedProvider::new("b", Behavior::Reply("nope"), Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary), Arc::clone(&fallback)]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["b"]);
        let agent = Agent::new(&registry, config).unwrap();

        let turn = agent.chat("hi").await;

        assert_eq!(turn.text, "ok");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn backend_error_falls_through_to_next_provider() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::BackendError, Arc::clone(&log));
        let fallback = ScriptedProvider::new("b", Behavior::Reply("ok"), Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary), Arc::clone(&fallback)]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["b"]);
        let agent = Agent::new(&registry, config).unwrap();

        let turn = agent.chat("hi").await;

        assert_eq!(turn.text, "ok");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        let order = log.lock().unwrap().clone();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn exhausted_chain_answers_from_rule_based_responder() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Unavailable, Arc::clone(&log));
        let fallback = ScriptedProvider::new("b", Behavior::BackendError, Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary), Arc::clone(&fallback)]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["b"]);
        let agent = Agent::new(&registry, config).unwrap();

        let turn = agent.chat("hello").await;

        assert!(!turn.text.is_empty());
        assert!(turn.text.starts_with("Hello!"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        let meta = turn.metadata.unwrap();
        assert_eq!(meta.provider.as_deref(), Some("rule-based"));
    }

    #[tokio::test]
    async fn always_failing_primary_still_yields_nonempty_reply() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Unavailable, Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary)]);

        let agent = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();

        for message in ["first", "second", "third"] {
            let turn = agent.chat(message).await;
            assert!(!turn.text.is_empty());
        }
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn unavailable_precheck_skips_generate() {
        let log = call_log();
        let primary = ScriptedProvider::reporting_unavailable("a", Arc::clone(&log));
        let fallback = ScriptedProvider::new("b", Behavior::Reply("ok"), Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary), Arc::clone(&fallback)]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["b"]);
        let agent = Agent::new(&registry, config).unwrap();

        let turn = agent.chat("hi").await;

        assert_eq!(turn.text, "ok");
        assert_eq!(primary.calls(), 0);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn stalled_provider_is_abandoned_at_the_deadline() {
        let log = call_log();
        let primary = ScriptedProvider::new(
            "a",
            Behavior::Stall(Duration::from_millis(500)),
            Arc::clone(&log),
        );
        let fallback = ScriptedProvider::new("b", Behavior::Reply("ok"), Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary), Arc::clone(&fallback)]);

        let config = AgentConfig::for_primary("a")
            .with_fallback_chain(["b"])
            .with_provider_timeout(Duration::from_millis(50));
        let agent = Agent::new(&registry, config).unwrap();

        let turn = agent.chat("hi").await;

        assert_eq!(turn.text, "ok");
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_attempted_once() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::BackendError, Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary)]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["a", "a"]);
        let agent = Agent::new(&registry, config).unwrap();

        let _ = agent.chat("hi").await;

        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_fallback_identifier_fails_construction() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("ok"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let config = AgentConfig::for_primary("a").with_fallback_chain(["ghost"]);
        let err = Agent::new(&registry, config).unwrap_err();

        assert!(matches!(err, AgentError::Configuration(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn unknown_primary_identifier_fails_construction() {
        let registry = ProviderRegistry::new();
        let err = Agent::new(&registry, AgentConfig::for_primary("ghost")).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[tokio::test]
    async fn invalid_parameters_fail_construction() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("ok"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let mut config = AgentConfig::for_primary("a");
        config.temperature = 3.0;
        assert!(Agent::new(&registry, config).is_err());
    }

    #[tokio::test]
    async fn chat_appends_both_turns() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let agent = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();
        let _ = agent.chat("question").await;

        let history = agent.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].text, "question");
        assert_eq!(history[1].role, TurnRole::Assistant);
        assert_eq!(history[1].text, "reply");
    }

    #[tokio::test]
    async fn assistant_turn_carries_provider_metadata() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let agent = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();
        let turn = agent.chat("question").await;

        let meta = turn.metadata.unwrap();
        assert_eq!(meta.provider.as_deref(), Some("a"));
        assert_eq!(meta.model.as_deref(), Some("a-model"));
        assert!(meta.latency_ms.is_some());
    }

    #[tokio::test]
    async fn history_stays_bounded_with_pinned_system_turn() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let config = AgentConfig::for_primary("a")
            .with_max_history_turns(3)
            .with_system_prompt("Be terse.");
        let agent = Agent::new(&registry, config).unwrap();

        for i in 0..5 {
            let _ = agent.chat(format!("message {i}")).await;
        }

        let history = agent.history().await;
        assert_eq!(history[0].role, TurnRole::System);
        let non_system = history.iter().filter(|t| t.role != TurnRole::System).count();
        assert!(non_system <= 3);
        // the newest assistant reply is always retained
        assert_eq!(history.last().unwrap().role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn provider_sees_system_prompt_and_history() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[Arc::clone(&primary)]);

        let config = AgentConfig::for_primary("a").with_system_prompt("Be terse.");
        let agent = Agent::new(&registry, config).unwrap();

        let _ = agent.chat("question").await;
        let history = agent.history().await;
        assert_eq!(history[0].role, TurnRole::System);
        assert_eq!(history[0].text, "Be terse.");
    }

    #[tokio::test]
    async fn reset_keeps_only_the_system_turn() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let config = AgentConfig::for_primary("a").with_system_prompt("Be terse.");
        let agent = Agent::new(&registry, config).unwrap();

        let _ = agent.chat("question").await;
        agent.reset().await;

        let history = agent.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, TurnRole::System);
    }

    #[tokio::test]
    async fn concurrent_chats_are_serialized_per_session() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let agent = Arc::new(Agent::new(&registry, AgentConfig::for_primary("a")).unwrap());

        let first = tokio::spawn({
            let agent = Arc::clone(&agent);
            async move { agent.chat("one").await }
        });
        let second = tokio::spawn({
            let agent = Arc::clone(&agent);
            async move { agent.chat("two").await }
        });

        first.await.unwrap();
        second.await.unwrap();

        // both exchanges landed intact: user and assistant turns alternate
        let history = agent.history().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].role, TurnRole::Assistant);
        assert_eq!(history[2].role, TurnRole::User);
        assert_eq!(history[3].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let agent_one = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();
        let agent_two = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();

        let _ = agent_one.chat("only in session one").await;

        assert_ne!(agent_one.session_id().await, agent_two.session_id().await);
        assert_eq!(agent_one.history().await.len(), 2);
        assert!(agent_two.history().await.is_empty());
    }

    #[tokio::test]
    async fn summary_reflects_exchanges() {
        let log = call_log();
        let primary = ScriptedProvider::new("a", Behavior::Reply("reply"), Arc::clone(&log));
        let registry = registry_of(&[primary]);

        let agent = Agent::new(&registry, AgentConfig::for_primary("a")).unwrap();
        let _ = agent.chat("question").await;

        let summary = agent.summary().await;
        assert_eq!(summary.user_turns, 1);
        assert_eq!(summary.assistant_turns, 1);
    }
}
