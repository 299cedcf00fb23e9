use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{ChatStore, Result, StoreError, sort_summaries};
use crate::models::{ChatRecord, ChatSummary, ChatUpdate};

/// In-memory chat store
#[derive(Debug, Default)]
pub struct MemoryStore {
    chats: Mutex<HashMap<String, ChatRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `chats`
    pub fn with_chats(chats: impl IntoIterator<Item = ChatRecord>) -> Self {
        let chats = chats.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { chats: Mutex::new(chats) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, ChatRecord>>> {
        self.chats.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ChatStore for MemoryStore {
    fn get_chats(&self) -> Result<Vec<ChatSummary>> {
        let mut summaries: Vec<ChatSummary> = self.lock()?.values().map(ChatRecord::summary).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn create_new_chat(&self, chat: &ChatRecord) -> Result<()> {
        let mut chats = self.lock()?;
        if chats.contains_key(&chat.id) {
            return Err(StoreError::AlreadyExists(chat.id.clone()));
        }
        chats.insert(chat.id.clone(), chat.clone());
        Ok(())
    }

    fn update_chat_by_id(&self, id: &str, update: ChatUpdate) -> Result<ChatRecord> {
        let mut chats = self.lock()?;
        let chat = chats.get_mut(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(chat);
        Ok(chat.clone())
    }

    fn delete_chat_by_id(&self, id: &str) -> Result<()> {
        self.lock()?.remove(id).map(|_| ()).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
