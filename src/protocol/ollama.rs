use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::{MessageRecord, Role};

/// Give up on a stream after this many malformed frames in a row
const MAX_CONSECUTIVE_ERRORS: usize = 100;

/// Longest frame excerpt kept in error messages
const FRAME_EXCERPT_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame {excerpt:?}: {source}")]
    InvalidJson {
        excerpt: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("too many consecutive malformed frames ({0}) - stream may be corrupted")]
    TooManyErrors(usize),
}

/// Message entry of a `/api/chat` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&MessageRecord> for ChatMessage {
    fn from(record: &MessageRecord) -> Self {
        Self { role: record.role, content: record.content_str().to_string() }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// One newline-delimited envelope from `/api/chat` or `/api/generate`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "crate::protocol::deserializers::deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    /// `/api/generate` puts its text here instead of in `message`
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub context: Option<Vec<i64>>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl ChatChunk {
    /// Incremental text carried by this chunk
    pub fn delta(&self) -> &str {
        match (&self.message, &self.response) {
            (Some(message), _) => &message.content,
            (None, Some(response)) => response,
            (None, None) => "",
        }
    }

    /// Context vector and timing stats of the final chunk, keyed the way
    /// they are stored on the reply message
    pub fn stats(&self) -> Map<String, Value> {
        let mut stats = Map::new();
        if let Some(context) = &self.context {
            stats.insert("context".to_string(), Value::from(context.clone()));
        }
        if let Some(reason) = &self.done_reason {
            stats.insert("done_reason".to_string(), Value::from(reason.clone()));
        }
        let counters = [
            ("total_duration", self.total_duration),
            ("load_duration", self.load_duration),
            ("prompt_eval_count", self.prompt_eval_count),
            ("prompt_eval_duration", self.prompt_eval_duration),
            ("eval_count", self.eval_count),
            ("eval_duration", self.eval_duration),
        ];
        for (key, value) in counters {
            if let Some(value) = value {
                stats.insert(key.to_string(), Value::from(value));
            }
        }
        stats
    }
}

/// Response of `POST /api/generate` with `stream: false`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

/// Parse one frame. Blank frames yield `None`; an SSE-style `data:` prefix
/// is accepted and stripped.
pub fn parse_frame(frame: &str) -> Result<Option<ChatChunk>, ProtocolError> {
    let body = frame.trim();
    let body = body.strip_prefix("data:").map(str::trim_start).unwrap_or(body);
    if body.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(body).map(Some).map_err(|source| ProtocolError::InvalidJson {
        excerpt: body.chars().take(FRAME_EXCERPT_CHARS).collect(),
        source,
    })
}

/// Frame parser for a whole response stream.
///
/// A malformed frame is logged and skipped so one bad line does not lose the
/// reply, but a long run of them means the stream is not what we expect.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    consecutive_errors: usize,
    skipped: usize,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, frame: &str) -> Result<Option<ChatChunk>, ProtocolError> {
        match parse_frame(frame) {
            Ok(chunk) => {
                self.consecutive_errors = 0;
                Ok(chunk)
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                self.skipped += 1;
                self.consecutive_errors += 1;
                if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(ProtocolError::TooManyErrors(self.consecutive_errors));
                }
                Ok(None)
            }
        }
    }

    /// Malformed frames skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
