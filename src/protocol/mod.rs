//! Wire format of the Ollama HTTP API
//!
//! # Error Handling Strategy
//!
//! Streamed replies are parsed frame by frame with graceful degradation:
//!
//! - **Blank frames**: ignored (servers pad streams with empty lines).
//! - **Malformed frames**: logged with `tracing::warn!` and skipped, so one
//!   corrupt line does not throw away a reply that is otherwise arriving fine.
//! - **Corruption detection**: 100 malformed frames in a row abort the stream
//!   with [`ProtocolError::TooManyErrors`].
//! - **Server errors**: a frame carrying an `error` field parses fine; it is
//!   up to the caller (the chat session) to surface it.

pub mod deserializers;
pub mod ollama;

pub use ollama::{
    ChatChunk, ChatMessage, ChatRequest, ChunkDecoder, ChunkMessage, GenerateRequest,
    GenerateResponse, ModelDetails, ModelInfo, ModelList, ProtocolError, parse_frame,
};
