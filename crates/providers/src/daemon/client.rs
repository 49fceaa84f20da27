//! Ollama-compatible daemon client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::DaemonConfig;
use crate::error::ProviderError;
use crate::ports::{
    ChatRequest, ModelProvider, ProviderKind, ProviderReply, ReplyStream, TokenUsage,
};

use super::streaming::create_stream;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Provider backed by a local Ollama-compatible daemon
#[derive(Debug)]
pub struct LocalDaemonProvider {
    id: String,
    client: Client,
    config: DaemonConfig,
}

impl LocalDaemonProvider {
    /// Create a new daemon provider
    pub fn new(config: DaemonConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Initialized local daemon provider"
        );

        Ok(Self {
            id: "local-daemon".to_string(),
            client,
            config,
        })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(DaemonConfig::default())
    }

    /// Override the registry identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Get the model to use for a request
    fn resolve_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    fn wire_request(&self, request: &ChatRequest, stream: bool) -> DaemonChatRequest {
        DaemonChatRequest {
            model: self.resolve_model(request).to_string(),
            messages: request
                .messages
                .iter()
                .map(|m| DaemonMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: DaemonOptions {
                temperature: request.temperature.or(Some(self.config.temperature)),
                num_predict: request.max_tokens.or(Some(self.config.max_tokens)),
                top_p: Some(self.config.top_p),
            },
        }
    }

    /// List the models the daemon currently serves
    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self.client.get(self.api_url("tags")).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let models: DaemonModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(models.models.into_iter().map(|m| m.name).collect())
    }
}

/// Daemon-format chat request
#[derive(Debug, Serialize)]
struct DaemonChatRequest {
    model: String,
    messages: Vec<DaemonMessage>,
    stream: bool,
    options: DaemonOptions,
}

#[derive(Debug, Serialize)]
struct DaemonMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct DaemonOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

/// Daemon-format chat response
#[derive(Debug, Deserialize)]
struct DaemonChatResponse {
    model: String,
    message: DaemonResponseMessage,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DaemonResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct DaemonModelsResponse {
    models: Vec<DaemonModel>,
}

#[derive(Debug, Deserialize)]
struct DaemonModel {
    name: String,
}

#[async_trait]
impl ModelProvider for LocalDaemonProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalDaemon
    }

    #[instrument(skip(self))]
    async fn is_available(&self) -> bool {
        let response = self
            .client
            .get(self.api_url("tags"))
            .timeout(AVAILABILITY_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Daemon availability check failed");
                false
            },
        }
    }

    #[instrument(skip(self, request), fields(model = %self.resolve_model(&request)))]
    async fn generate(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        let wire = self.wire_request(&request, false);

        debug!("Sending chat request to daemon");

        let response = self
            .client
            .post(self.api_url("chat"))
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Daemon chat request failed");
            return Err(ProviderError::from_status(status, body));
        }

        let reply: DaemonChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let usage = match (reply.prompt_eval_count, reply.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        debug!(tokens = ?usage, "Daemon chat completed");

        Ok(ProviderReply {
            text: reply.message.content,
            model: reply.model,
            usage,
            finish_reason: reply.done.then(|| "stop".to_string()),
        })
    }

    #[instrument(skip(self, request), fields(model = %self.resolve_model(&request)))]
    async fn generate_stream(&self, request: ChatRequest) -> Result<ReplyStream, ProviderError> {
        let wire = self.wire_request(&request, true);

        debug!("Starting streaming chat request to daemon");

        let response = self
            .client
            .post(self.api_url("chat"))
            .json(&wire)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        Ok(create_stream(response))
    }
}
