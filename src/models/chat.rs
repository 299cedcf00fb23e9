use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::History;
use super::message::MessageRecord;

/// Title given to a chat until one is generated or set by hand
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub history: History,
    /// Last update, milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatRecord {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_CHAT_TITLE.to_string(),
            models: vec![model.into()],
            messages: Vec::new(),
            history: History::default(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn summary(&self) -> ChatSummary {
        ChatSummary { id: self.id.clone(), title: self.title.clone(), timestamp: self.timestamp }
    }

    pub fn touch(&mut self) {
        self.timestamp = Utc::now().timestamp_millis();
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Sidebar listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub timestamp: i64,
}

/// Partial update applied by `ChatStore::update_chat_by_id`; `None` leaves
/// the field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatUpdate {
    pub title: Option<String>,
    pub models: Option<Vec<String>>,
    pub messages: Option<Vec<MessageRecord>>,
    pub history: Option<History>,
}

impl ChatUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    /// Apply to `chat` and bump its timestamp
    pub fn apply_to(self, chat: &mut ChatRecord) {
        if let Some(title) = self.title {
            chat.title = title;
        }
        if let Some(models) = self.models {
            chat.models = models;
        }
        if let Some(messages) = self.messages {
            chat.messages = messages;
        }
        if let Some(history) = self.history {
            chat.history = history;
        }
        chat.touch();
    }
}
