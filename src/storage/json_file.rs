//! File-backed chat store with atomic writes

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ChatStore, Result, StoreError, sort_summaries, validate_chat_id};
use crate::models::{ChatRecord, ChatSummary, ChatUpdate};

const CHATS_DIRNAME: &str = "chats";
const CHAT_EXTENSION: &str = "json";

/// Stores each chat as `<data_dir>/chats/<id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    chats_dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if missing) the store under `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        let chats_dir = data_dir.join(CHATS_DIRNAME);
        fs::create_dir_all(&chats_dir).map_err(|source| StoreError::Io { path: chats_dir.clone(), source })?;
        Ok(Self { chats_dir })
    }

    pub fn chats_dir(&self) -> &Path {
        &self.chats_dir
    }

    fn chat_path(&self, id: &str) -> Result<PathBuf> {
        validate_chat_id(id)?;
        Ok(self.chats_dir.join(format!("{}.{}", id, CHAT_EXTENSION)))
    }

    fn read_chat(path: &Path) -> Result<ChatRecord> {
        let json = fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&json).map_err(|source| StoreError::Serde { path: path.to_path_buf(), source })
    }

    /// Write via temp file + rename so a crash never leaves half a chat behind
    fn write_chat(&self, path: &Path, chat: &ChatRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(chat)
            .map_err(|source| StoreError::Serde { path: path.to_path_buf(), source })?;

        let temp = path.with_extension(format!("{}.tmp", CHAT_EXTENSION));
        fs::write(&temp, json).map_err(|source| StoreError::Io { path: temp.clone(), source })?;
        fs::rename(&temp, path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;

        debug!(chat_id = %chat.id, path = %path.display(), "saved chat");
        Ok(())
    }
}

impl ChatStore for JsonFileStore {
    fn get_chats(&self) -> Result<Vec<ChatSummary>> {
        let entries = fs::read_dir(&self.chats_dir)
            .map_err(|source| StoreError::Io { path: self.chats_dir.clone(), source })?;

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io { path: self.chats_dir.clone(), source })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHAT_EXTENSION) || !path.is_file() {
                continue;
            }

            // One unreadable chat should not hide the rest
            match Self::read_chat(&path) {
                Ok(chat) => summaries.push(chat.summary()),
                Err(e) => warn!(error = %e, "skipping unreadable chat file"),
            }
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatRecord>> {
        let path = self.chat_path(id)?;
        match Self::read_chat(&path) {
            Ok(chat) => Ok(Some(chat)),
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_new_chat(&self, chat: &ChatRecord) -> Result<()> {
        let path = self.chat_path(&chat.id)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists(chat.id.clone()));
        }
        self.write_chat(&path, chat)
    }

    fn update_chat_by_id(&self, id: &str, update: ChatUpdate) -> Result<ChatRecord> {
        let mut chat = self.get_chat_by_id(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(&mut chat);
        self.write_chat(&self.chat_path(id)?, &chat)?;
        Ok(chat)
    }

    fn delete_chat_by_id(&self, id: &str) -> Result<()> {
        let path = self.chat_path(id)?;
        fs::remove_file(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id.to_string()),
            _ => StoreError::Io { path: path.clone(), source },
        })
    }
}
