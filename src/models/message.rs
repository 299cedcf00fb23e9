use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One chat turn as stored in a chat record's flat `messages` list.
///
/// Only `role` is required. Anything else the client attached to the turn
/// (model name, timing stats, a context vector) lands in `extra` and is
/// written back out untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `Some(false)` while an assistant reply is still streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageRecord {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), done: None, extra: Map::new() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Empty assistant reply waiting for streamed content
    pub fn pending_reply(model: &str) -> Self {
        let mut record = Self::assistant("");
        record.done = Some(false);
        record.extra.insert("model".to_string(), Value::String(model.to_string()));
        record
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.get_or_insert_with(String::new).push_str(delta);
    }

    pub fn is_streaming(&self) -> bool {
        self.done == Some(false)
    }
}
