//! Ollama Chat - a terminal client for chatting with Ollama models
//!
//! Chats are kept in two shapes: a flat list of turns, and a tree of the same
//! turns where a regenerated reply sits beside the one it replaces. This
//! library provides:
//!
//! - Building the message tree from a flat list and navigating it ([`history`])
//! - Splitting a chunked response body back into delimited frames ([`stream`])
//! - The Ollama wire format and an HTTP client for it ([`protocol`], [`client`])
//! - A file-backed chat store ([`storage`]) and the session tying it all
//!   together ([`session`])
//!
//! # Example
//!
//! ```
//! use ollama_chat::{DelimitedSplitter, MessageRecord, SequentialIds, build_history};
//!
//! let messages = vec![MessageRecord::user("Hi"), MessageRecord::assistant("Hello!")];
//! let history = build_history(messages, &mut SequentialIds::new("m"));
//! assert_eq!(history.current_id.as_deref(), Some("m2"));
//!
//! let mut splitter = DelimitedSplitter::lines();
//! assert_eq!(splitter.feed("{\"done\":false}\n{\"do").unwrap(), vec!["{\"done\":false}"]);
//! assert_eq!(splitter.finish().as_deref(), Some("{\"do"));
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod history;
pub mod models;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod stream;
pub mod utils;

// Re-export commonly used types
pub use client::{ChatBackend, OllamaClient};
pub use config::Settings;
pub use history::{IdGenerator, SequentialIds, UuidIds, build_history};
pub use models::{ChatRecord, History, HistoryNode, MessageRecord, Role};
pub use session::{ChatSession, SessionError};
pub use storage::{ChatStore, JsonFileStore, MemoryStore};
pub use stream::{DelimitedSplitter, SplitError};
