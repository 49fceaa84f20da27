//! Agent configuration

use std::time::Duration;

use serde::Deserialize;

use crate::error::AgentError;

/// Configuration for one agent session. Immutable after construction;
/// changing it means constructing a new agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Identifier of the primary provider
    pub primary: String,

    /// Providers tried, in order, after the primary fails
    #[serde(default)]
    pub fallback_chain: Vec<String>,

    /// Non-system turns retained in the conversation
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Optional pinned system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Token budget passed to providers
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature passed to providers (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Deadline for a single provider call, in milliseconds. An elapsed
    /// deadline reads as the provider being unavailable and the chain
    /// moves on. `None` means no deadline.
    #[serde(default)]
    pub provider_timeout_ms: Option<u64>,
}

const fn default_max_history_turns() -> usize {
    domain::DEFAULT_MAX_TURNS
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f32 {
    0.7
}

impl AgentConfig {
    /// Configuration with defaults for the given primary provider
    pub fn for_primary(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback_chain: Vec::new(),
            max_history_turns: default_max_history_turns(),
            system_prompt: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            provider_timeout_ms: None,
        }
    }

    /// Set the fallback chain
    #[must_use]
    pub fn with_fallback_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    /// Set the history limit
    #[must_use]
    pub const fn with_max_history_turns(mut self, max_history_turns: usize) -> Self {
        self.max_history_turns = max_history_turns;
        self
    }

    /// Set the pinned system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the per-provider-call deadline
    #[must_use]
    pub const fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The per-provider-call deadline, if configured
    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }

    /// Validate value ranges. Provider identifiers are checked against the
    /// registry at agent construction, not here.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.primary.is_empty() {
            return Err(AgentError::Configuration(
                "primary provider identifier is empty".to_string(),
            ));
        }
        if self.max_history_turns == 0 {
            return Err(AgentError::Configuration(
                "max_history_turns must be at least 1".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(AgentError::Configuration(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AgentError::Configuration(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AgentConfig::for_primary("local-daemon");
        assert_eq!(config.primary, "local-daemon");
        assert!(config.fallback_chain.is_empty());
        assert_eq!(config.max_history_turns, 10);
        assert_eq!(config.max_tokens, 2048);
        assert!((config.temperature - 0.7).abs() < 0.01);
        assert!(config.provider_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_chaining() {
        let config = AgentConfig::for_primary("hosted-api")
            .with_fallback_chain(["local-daemon", "rule-based"])
            .with_max_history_turns(4)
            .with_system_prompt("Be terse.")
            .with_provider_timeout(Duration::from_secs(10));

        assert_eq!(config.fallback_chain, vec!["local-daemon", "rule-based"]);
        assert_eq!(config.max_history_turns, 4);
        assert_eq!(config.system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(config.provider_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn empty_primary_is_rejected() {
        let config = AgentConfig::for_primary("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_history_is_rejected() {
        let config = AgentConfig::for_primary("p").with_max_history_turns(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let mut config = AgentConfig::for_primary("p");
        config.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut config = AgentConfig::for_primary("p");
        config.temperature = 2.5;
        assert!(config.validate().is_err());

        config.temperature = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn boundary_temperatures_are_accepted() {
        let mut config = AgentConfig::for_primary("p");
        config.temperature = 0.0;
        assert!(config.validate().is_ok());
        config.temperature = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"primary":"local-daemon"}"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.primary, "local-daemon");
        assert_eq!(config.max_history_turns, 10);
        assert!(config.fallback_chain.is_empty());
    }

    #[test]
    fn deserializes_full_shape() {
        let json = r#"{
            "primary": "hosted-api",
            "fallback_chain": ["local-daemon"],
            "max_history_turns": 6,
            "system_prompt": "Be helpful.",
            "provider_timeout_ms": 5000
        }"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.fallback_chain, vec!["local-daemon"]);
        assert_eq!(config.provider_timeout(), Some(Duration::from_millis(5000)));
    }
}
