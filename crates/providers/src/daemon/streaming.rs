//! Streaming reply handling for Ollama-compatible daemons
//!
//! The daemon streams NDJSON: one JSON object per line, the last with
//! `"done": true`.

use futures::stream::{self, StreamExt};
use reqwest::Response;
use serde::Deserialize;
use tracing::trace;

use crate::error::ProviderError;
use crate::ports::{ReplyChunk, ReplyStream};

/// Daemon streaming response line
#[derive(Debug, Deserialize)]
struct DaemonStreamChunk {
    model: String,
    message: DaemonStreamMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct DaemonStreamMessage {
    content: String,
}

/// Turn an HTTP response body into a chunk stream
pub fn create_stream(response: Response) -> ReplyStream {
    let byte_stream = response.bytes_stream();

    let chunk_stream = byte_stream
        .map(|result| match result {
            Ok(bytes) => parse_chunks(&bytes),
            Err(e) => vec![Err(ProviderError::StreamFailed(e.to_string()))],
        })
        .flat_map(stream::iter);

    Box::pin(chunk_stream)
}

/// Parse NDJSON chunks from bytes
fn parse_chunks(bytes: &[u8]) -> Vec<Result<ReplyChunk, ProviderError>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => {
            return vec![Err(ProviderError::InvalidResponse(format!(
                "invalid UTF-8: {e}"
            )))];
        },
    };

    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            trace!(line = %line, "Parsing stream chunk");

            let chunk: DaemonStreamChunk = serde_json::from_str(line)
                .map_err(|e| ProviderError::InvalidResponse(format!("JSON parse error: {e}")))?;

            Ok(ReplyChunk {
                text: chunk.message.content,
                done: chunk.done,
                model: chunk.done.then_some(chunk.model),
            })
        })
        .collect()
}
