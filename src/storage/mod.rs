//! Chat storage
//!
//! [`ChatStore`] is the contract the rest of the crate uses to read and write
//! conversations. Two implementations ship with the crate:
//!
//! - [`JsonFileStore`]: one pretty-printed `<chat id>.json` file per chat,
//!   written atomically (temp file + rename)
//! - [`MemoryStore`]: a mutex-guarded map, for tests and throwaway sessions

pub mod json_file;
pub mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{ChatRecord, ChatSummary, ChatUpdate};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chat {0} not found")]
    NotFound(String),

    #[error("chat {0} already exists")]
    AlreadyExists(String),

    #[error("invalid chat id {0:?}")]
    InvalidId(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to (de)serialize chat {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("chat store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait ChatStore {
    /// All chats, most recently updated first
    fn get_chats(&self) -> Result<Vec<ChatSummary>>;

    fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatRecord>>;

    fn create_new_chat(&self, chat: &ChatRecord) -> Result<()>;

    /// Apply `update` and return the stored result
    fn update_chat_by_id(&self, id: &str, update: ChatUpdate) -> Result<ChatRecord>;

    fn delete_chat_by_id(&self, id: &str) -> Result<()>;
}

impl<T: ChatStore + ?Sized> ChatStore for &T {
    fn get_chats(&self) -> Result<Vec<ChatSummary>> {
        (**self).get_chats()
    }

    fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatRecord>> {
        (**self).get_chat_by_id(id)
    }

    fn create_new_chat(&self, chat: &ChatRecord) -> Result<()> {
        (**self).create_new_chat(chat)
    }

    fn update_chat_by_id(&self, id: &str, update: ChatUpdate) -> Result<ChatRecord> {
        (**self).update_chat_by_id(id, update)
    }

    fn delete_chat_by_id(&self, id: &str) -> Result<()> {
        (**self).delete_chat_by_id(id)
    }
}

/// Chat ids become file names, so keep them to a conservative alphabet
pub fn validate_chat_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid { Ok(()) } else { Err(StoreError::InvalidId(id.to_string())) }
}

/// Newest first, ties broken by id so listings are stable
pub(crate) fn sort_summaries(summaries: &mut [ChatSummary]) {
    summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
}
