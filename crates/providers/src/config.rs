//! Provider connection configuration

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Configuration for the local daemon provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Base URL of the model daemon
    #[serde(default = "default_daemon_base_url")]
    pub base_url: String,

    /// Default model to use
    #[serde(default = "default_daemon_model")]
    pub model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_daemon_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top-p (nucleus) sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_daemon_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_daemon_model() -> String {
    "llama3.2".to_string()
}

const fn default_daemon_timeout_ms() -> u64 {
    60_000
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_top_p() -> f32 {
    0.9
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_url: default_daemon_base_url(),
            model: default_daemon_model(),
            timeout_ms: default_daemon_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Configuration for the hosted API provider
///
/// Deliberately not `Serialize`: the credential must not end up in logs
/// or exported config.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedConfig {
    /// Base URL of the inference endpoint
    #[serde(default = "default_hosted_base_url")]
    pub base_url: String,

    /// Default model to use
    #[serde(default = "default_hosted_model")]
    pub model: String,

    /// Bearer credential; `None` means the provider is not configured
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Request timeout in milliseconds
    #[serde(default = "default_hosted_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_hosted_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_hosted_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_hosted_timeout_ms() -> u64 {
    30_000
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            base_url: default_hosted_base_url(),
            model: default_hosted_model(),
            api_key: None,
            timeout_ms: default_hosted_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl HostedConfig {
    /// Set the bearer credential
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn daemon_defaults_are_sensible() {
        let config = DaemonConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.max_tokens, 2048);
        assert!((config.temperature - 0.7).abs() < 0.01);
        assert!((config.top_p - 0.9).abs() < 0.01);
    }

    #[test]
    fn daemon_config_deserializes_with_defaults() {
        let config: DaemonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn daemon_config_overrides() {
        let json = r#"{"base_url":"http://custom:8080","model":"mistral"}"#;
        let config: DaemonConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "http://custom:8080");
        assert_eq!(config.model, "mistral");
    }

    #[test]
    fn hosted_defaults_have_no_credential() {
        let config = HostedConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com");
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn hosted_with_api_key_sets_credential() {
        let config = HostedConfig::default().with_api_key("sk-test");
        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn hosted_config_deserializes_credential() {
        let json = r#"{"api_key":"sk-abc","model":"gpt-4o"}"#;
        let config: HostedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-abc");
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn hosted_config_debug_redacts_credential() {
        let config = HostedConfig::default().with_api_key("sk-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
    }
}
