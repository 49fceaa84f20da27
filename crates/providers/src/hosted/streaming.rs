//! Streaming reply handling for OpenAI-compatible endpoints
//!
//! The endpoint streams server-sent events: `data: {json}` lines carrying
//! content deltas, terminated by a `data: [DONE]` sentinel.

use futures::stream::{self, StreamExt};
use reqwest::Response;
use serde::Deserialize;
use tracing::trace;

use crate::error::ProviderError;
use crate::ports::{ReplyChunk, ReplyStream};

const DONE_SENTINEL: &str = "[DONE]";

/// Streaming completions event payload
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Turn an HTTP response body into a chunk stream
pub fn create_stream(response: Response) -> ReplyStream {
    let byte_stream = response.bytes_stream();

    let chunk_stream = byte_stream
        .map(|result| match result {
            Ok(bytes) => parse_events(&bytes),
            Err(e) => vec![Err(ProviderError::StreamFailed(e.to_string()))],
        })
        .flat_map(stream::iter);

    Box::pin(chunk_stream)
}

/// Parse SSE `data:` lines from bytes
fn parse_events(bytes: &[u8]) -> Vec<Result<ReplyChunk, ProviderError>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            return vec![Err(ProviderError::InvalidResponse(format!(
                "invalid UTF-8: {e}"
            )))];
        },
    };

    text.lines()
        .filter_map(|line| line.strip_prefix("data:").map(str::trim))
        .filter(|payload| !payload.is_empty())
        .map(|payload| {
            trace!(payload = %payload, "Parsing stream event");

            if payload == DONE_SENTINEL {
                return Ok(ReplyChunk {
                    text: String::new(),
                    done: true,
                    model: None,
                });
            }

            let event: StreamEvent = serde_json::from_str(payload)
                .map_err(|e| ProviderError::InvalidResponse(format!("JSON parse error: {e}")))?;

            let choice = event.choices.into_iter().next();
            let finished = choice
                .as_ref()
                .is_some_and(|c| c.finish_reason.is_some());

            Ok(ReplyChunk {
                text: choice
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default(),
                done: finished,
                model: finished.then_some(event.model).flatten(),
            })
        })
        .collect()
}
