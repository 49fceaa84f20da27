//! In-process provider
//!
//! Runs a model inside the calling process instead of over a network.
//! The actual runtime is behind the [`CompletionModel`] trait: the
//! embedding application loads its weights with whatever runtime it uses
//! and attaches the result here. Until a model is attached the provider
//! reports unavailable; generation runs on a blocking thread because it
//! is compute-bound.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::error::ProviderError;
use crate::ports::{
    ChatRequest, ModelProvider, PromptMessage, ProviderKind, ProviderReply, ReplyChunk,
    ReplyStream,
};

/// A synchronous text-completion model hosted in this process
///
/// Implementations own loaded weights and whatever runtime drives them.
/// `complete` is called on a blocking thread and may take seconds.
pub trait CompletionModel: Send + Sync {
    /// Name of the loaded model
    fn name(&self) -> &str;

    /// Complete the rendered prompt
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

const DEFAULT_MAX_TOKENS: u32 = 256;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Provider that computes replies with an in-process model
pub struct InProcessProvider {
    id: String,
    model: RwLock<Option<Arc<dyn CompletionModel>>>,
}

impl std::fmt::Debug for InProcessProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessProvider")
            .field("id", &self.id)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl InProcessProvider {
    /// Create an unloaded provider
    pub fn new() -> Self {
        Self {
            id: "in-process".to_string(),
            model: RwLock::new(None),
        }
    }

    /// Create a provider with a model already attached
    pub fn with_model(model: Arc<dyn CompletionModel>) -> Self {
        let provider = Self::new();
        provider.attach(model);
        provider
    }

    /// Override the registry identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a loaded model, replacing any previous one
    pub fn attach(&self, model: Arc<dyn CompletionModel>) {
        info!(model = %model.name(), "Attached in-process model");
        *self.model.write() = Some(model);
    }

    /// Detach the current model; the provider reports unavailable again
    pub fn detach(&self) {
        *self.model.write() = None;
    }

    /// Whether a model is currently attached
    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    fn current_model(&self) -> Result<Arc<dyn CompletionModel>, ProviderError> {
        self.model.read().clone().ok_or_else(|| {
            ProviderError::NotLoaded(format!("no model attached to provider '{}'", self.id))
        })
    }

    async fn complete_off_thread(
        &self,
        request: &ChatRequest,
    ) -> Result<ProviderReply, ProviderError> {
        let model = self.current_model()?;
        let prompt = render_prompt(&request.messages);
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        debug!(prompt_len = prompt.len(), "Running in-process completion");

        let name = model.name().to_string();
        let text = tokio::task::spawn_blocking(move || {
            model.complete(&prompt, max_tokens, temperature)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("completion worker failed: {e}")))??;

        Ok(ProviderReply {
            text,
            model: name,
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }
}

impl Default for InProcessProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Render chat messages into a flat prompt for completion-style models
fn render_prompt(messages: &[PromptMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let speaker = match message.role.as_str() {
            "system" => "System",
            "assistant" => "Assistant",
            _ => "User",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

#[async_trait]
impl ModelProvider for InProcessProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::InProcess
    }

    async fn is_available(&self) -> bool {
        self.is_loaded()
    }

    #[instrument(skip(self, request))]
    async fn generate(&self, request: ChatRequest) -> Result<ProviderReply, ProviderError> {
        self.complete_off_thread(&request).await
    }

    /// The runtime behind [`CompletionModel`] is not incremental, so the
    /// stream is a single final chunk.
    #[instrument(skip(self, request))]
    async fn generate_stream(&self, request: ChatRequest) -> Result<ReplyStream, ProviderError> {
        let reply = self.complete_off_thread(&request).await?;
        Ok(Box::pin(stream::once(async move {
            Ok(ReplyChunk {
                text: reply.text,
                done: true,
                model: Some(reply.model),
            })
        })))
    }
}
