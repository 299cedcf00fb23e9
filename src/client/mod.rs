//! Talking to the model server.
//!
//! [`ChatBackend`] is the seam the chat session streams replies through.
//! [`OllamaClient`] implements it over HTTP; tests substitute canned chunk
//! streams.

pub mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::protocol::{ChatRequest, GenerateRequest};

pub use ollama::OllamaClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to model server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid Authorization header value")]
    InvalidAuthHeader,

    #[error("{0}")]
    Other(String),
}

/// Text chunks of a streamed response body, in arrival order. Chunk
/// boundaries are arbitrary; frames are recovered by the caller.
pub type ChunkStream = BoxStream<'static, Result<String, ClientError>>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streaming `/api/chat` request
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ClientError>;

    /// Run a non-streaming `/api/generate` request and return the text
    async fn generate(&self, request: GenerateRequest) -> Result<String, ClientError>;
}
