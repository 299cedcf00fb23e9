//! Data models for chats and their message trees.
//!
//! - [`MessageRecord`] - One chat turn as persisted in a chat's flat message list
//! - [`HistoryNode`] / [`History`] - The same turns arranged as a parent/child tree
//! - [`ChatRecord`] - A stored conversation (title, models, messages, history)
//!
//! All models round-trip through serde_json in the camelCase layout the chat
//! store writes. Unknown per-message fields are kept in a flattened map so
//! nothing a client attached to a message is lost on a load/save cycle.

pub mod chat;
pub mod history;
pub mod message;

pub use chat::{ChatRecord, ChatSummary, ChatUpdate, DEFAULT_CHAT_TITLE};
pub use history::{History, HistoryNode};
pub use message::{MessageRecord, Role};
