//! OpenAI-compatible hosted endpoint client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::HostedConfig;
use crate::error::ProviderError;
use crate::ports::{
    ChatRequest, ModelProvider, ProviderKind, ProviderReply, ReplyStream, TokenUsage,
};

use super::streaming::create_stream;

/// Provider backed by a remote OpenAI-compatible inference API
#[derive(Debug)]
pub struct HostedApiProvider {
    id: String,
    client: Client,
    config: HostedConfig,
}

impl HostedApiProvider {
    /// Create a new hosted API provider
    pub fn new(config: HostedConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            configured = config.api_key.is_some(),
            "Initialized hosted API provider"
        );

        Ok(Self {
            id: "hosted-api".to_string(),
            client,
            config,
        })
    }

    /// Create with default configuration (unconfigured: no credential)
    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(HostedConfig::default())
    }

    /// Override the registry identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn resolve_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    /// Whether a credential is configured and non-empty
    fn has_credential(&self) -> bool {
        self.config
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    fn wire_request(&self, request: &ChatRequest, stream: bool) -> CompletionsRequest {
        CompletionsRequest {
            model: self.resolve_model(request).to_string(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens.or(Some(self.config.max_tokens)),
            temperature: request.temperature.or(Some(self.config.temperature)),
            stream,
        }
    }

    async fn post(&self, wire: &CompletionsRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .authorize(self.client.post(self.completions_url()))
            .json(wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Hosted API request failed");
            return Err(ProviderError::from_status(status, body));
        }

        Ok(response)
    }
}

/// OpenAI-compatible chat completions request
#[derive(Debug, Serialize)]
struct CompletionsRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

/// OpenAI-compatible chat completions response
#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl ModelProvider for HostedApiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HostedApi
    }

    /// Cheap pre-check: a hosted endpoint is only usable with a
    /// credential. No network round-trip here.
    async fn is_available(&self) -> bool {
        self.has_credential()
    }

    #[instrument(skip(self, request), fields(model = %self.resolve_model(&request)))]
    async fn generate(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        let wire = self.wire_request(&request, false);

        debug!("Sending chat completions request");

        let response = self.post(&wire).await?;

        let completions: CompletionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = completions
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))?;

        let usage = completions.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        debug!(tokens = ?usage, "Chat completions request succeeded");

        Ok(ProviderReply {
            text: choice.message.content.unwrap_or_default(),
            model: completions.model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %self.resolve_model(&request)))]
    async fn generate_stream(&self, request: ChatRequest) -> Result<ReplyStream, ProviderError> {
        let wire = self.wire_request(&request, true);

        debug!("Starting streaming chat completions request");

        let response = self.post(&wire).await?;
        Ok(create_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_is_joined_correctly() {
        let provider = HostedApiProvider::with_defaults().unwrap();
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let provider = HostedApiProvider::new(HostedConfig {
            base_url: "https://inference.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            provider.completions_url(),
            "https://inference.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn default_id_and_kind() {
        let provider = HostedApiProvider::with_defaults().unwrap();
        assert_eq!(provider.id(), "hosted-api");
        assert_eq!(provider.kind(), ProviderKind::HostedApi);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_unavailable() {
        let provider = HostedApiProvider::with_defaults().unwrap();
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn empty_credential_is_unavailable() {
        let provider =
            HostedApiProvider::new(HostedConfig::default().with_api_key("")).unwrap();
        assert!(!provider.is_available().await);
    }

    #[tokio::test]
    async fn credential_makes_provider_available() {
        let provider =
            HostedApiProvider::new(HostedConfig::default().with_api_key("sk-test")).unwrap();
        assert!(provider.is_available().await);
    }

    #[test]
    fn wire_request_fills_defaults_from_config() {
        let provider = HostedApiProvider::with_defaults().unwrap();
        let wire = provider.wire_request(&ChatRequest::simple("hi"), false);
        assert_eq!(wire.model, "gpt-4o-mini");
        assert_eq!(wire.max_tokens, Some(2048));
        assert_eq!(wire.temperature, Some(0.7));
        assert!(!wire.stream);
    }

    #[test]
    fn wire_request_serializes_stream_flag() {
        let provider = HostedApiProvider::with_defaults().unwrap();
        let wire = provider.wire_request(&ChatRequest::simple("hi"), true);
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"stream\":true"));
    }
}
