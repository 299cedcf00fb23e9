//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use ollama_chat::client::{ChatBackend, ChunkStream, ClientError};
use ollama_chat::models::{ChatSummary, ChatUpdate};
use ollama_chat::protocol::{ChatRequest, GenerateRequest};
use ollama_chat::storage::StoreError;
use ollama_chat::{ChatRecord, ChatStore, MemoryStore, MessageRecord, Role};
use serde_json::json;
use tempfile::TempDir;

/// Builder for a data directory holding `chats/<id>.json` files
pub struct DataDirBuilder {
    temp_dir: TempDir,
}

impl DataDirBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(temp_dir.path().join("chats")).expect("Failed to create chats dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a chat file with the given raw content
    pub fn with_raw_chat(self, id: &str, content: &str) -> Self {
        let path = self.temp_dir.path().join("chats").join(format!("{}.json", id));
        fs::write(path, content).expect("Failed to write chat file");
        self
    }

    pub fn with_chat(self, chat: &ChatRecord) -> Self {
        let json = serde_json::to_string_pretty(chat).expect("Failed to serialize chat");
        self.with_raw_chat(&chat.id, &json)
    }

    /// Build and return the temp directory (consumes self)
    pub fn build(self) -> TempDir {
        self.temp_dir
    }
}

/// Builder for chat records as an older client would have stored them:
/// a flat message list and no history tree
pub struct ChatBuilder {
    chat: ChatRecord,
}

impl ChatBuilder {
    pub fn new(id: &str) -> Self {
        Self { chat: ChatRecord::new(id, "llama2") }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.chat.title = title.to_string();
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.chat.timestamp = timestamp;
        self
    }

    pub fn user(mut self, content: &str) -> Self {
        self.chat.messages.push(MessageRecord::user(content));
        self
    }

    pub fn assistant(mut self, content: &str) -> Self {
        self.chat.messages.push(MessageRecord::assistant(content));
        self
    }

    pub fn message(mut self, record: MessageRecord) -> Self {
        self.chat.messages.push(record);
        self
    }

    pub fn build(self) -> ChatRecord {
        self.chat
    }
}

/// Alternating user/assistant turns with numbered contents
pub fn conversation(turns: usize) -> Vec<MessageRecord> {
    (0..turns)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            MessageRecord::new(role, format!("turn {}", i))
        })
        .collect()
}

/// One `/api/chat` stream line carrying `content`
pub fn chat_frame(content: &str) -> String {
    json!({"model": "llama2", "message": {"role": "assistant", "content": content}, "done": false})
        .to_string()
}

/// Final `/api/chat` stream line with stats
pub fn done_frame() -> String {
    json!({
        "model": "llama2",
        "message": {"role": "assistant", "content": ""},
        "done": true,
        "done_reason": "stop",
        "context": [1, 2, 3],
        "eval_count": 7,
        "total_duration": 1200
    })
    .to_string()
}

/// Newline-terminated frames for `parts`, followed by the final frame
pub fn reply_body(parts: &[&str]) -> String {
    let mut body: String = parts.iter().map(|p| chat_frame(p) + "\n").collect();
    body.push_str(&done_frame());
    body.push('\n');
    body
}

/// Cut `text` into pieces of `size` bytes, never inside a character
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if current.len() + c.len_utf8() > size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// One scripted piece of a streamed reply
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(String),
    Fail(String),
    /// Keep the stream open without sending anything more
    Stall,
}

/// Backend that replays scripted chunk streams and records requests
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Vec<Step>>>,
    title: Option<Result<String, String>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub generate_requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply delivered as the given body chunks
    pub fn reply(self, chunks: Vec<String>) -> Self {
        self.script(chunks.into_iter().map(Step::Chunk).collect())
    }

    /// Queue a reply whose body is `reply_body(parts)` cut into `chunk_size` pieces
    pub fn reply_parts(self, parts: &[&str], chunk_size: usize) -> Self {
        self.reply(chunk_text(&reply_body(parts), chunk_size))
    }

    pub fn script(self, steps: Vec<Step>) -> Self {
        self.replies.lock().unwrap().push_back(steps);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(Ok(title.to_string()));
        self
    }

    pub fn failing_title(mut self, error: &str) -> Self {
        self.title = Some(Err(error.to_string()));
        self
    }

    pub fn chat_request_count(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
    }

    pub fn last_chat_request(&self) -> ChatRequest {
        self.chat_requests.lock().unwrap().last().cloned().expect("no chat request was made")
    }

    pub fn generate_request_count(&self) -> usize {
        self.generate_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChunkStream, ClientError> {
        self.chat_requests.lock().unwrap().push(request);
        let steps = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClientError::Other("no scripted reply left".to_string()))?;

        let stalls = steps.iter().any(|step| matches!(step, Step::Stall));
        let items: Vec<_> = steps
            .into_iter()
            .filter_map(|step| match step {
                Step::Chunk(text) => Some(Ok(text)),
                Step::Fail(message) => Some(Err(ClientError::Other(message))),
                Step::Stall => None,
            })
            .collect();
        let chunks = stream::iter(items);
        if stalls {
            Ok(chunks.chain(stream::pending()).boxed())
        } else {
            Ok(chunks.boxed())
        }
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ClientError> {
        self.generate_requests.lock().unwrap().push(request);
        match &self.title {
            Some(Ok(title)) => Ok(title.clone()),
            Some(Err(message)) => Err(ClientError::Other(message.clone())),
            None => Err(ClientError::Other("no scripted title".to_string())),
        }
    }
}

/// Memory store whose updates start failing after `updates` successful ones
pub struct LimitedStore {
    inner: MemoryStore,
    updates_left: AtomicUsize,
}

impl LimitedStore {
    pub fn new(updates: usize) -> Self {
        Self { inner: MemoryStore::new(), updates_left: AtomicUsize::new(updates) }
    }
}

impl ChatStore for LimitedStore {
    fn get_chats(&self) -> Result<Vec<ChatSummary>, StoreError> {
        self.inner.get_chats()
    }

    fn get_chat_by_id(&self, id: &str) -> Result<Option<ChatRecord>, StoreError> {
        self.inner.get_chat_by_id(id)
    }

    fn create_new_chat(&self, chat: &ChatRecord) -> Result<(), StoreError> {
        self.inner.create_new_chat(chat)
    }

    fn update_chat_by_id(&self, id: &str, update: ChatUpdate) -> Result<ChatRecord, StoreError> {
        let allowed = self.updates_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if !allowed {
            return Err(StoreError::Io {
                path: format!("{}.json", id).into(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.update_chat_by_id(id, update)
    }

    fn delete_chat_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_chat_by_id(id)
    }
}
