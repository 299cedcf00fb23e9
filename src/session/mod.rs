//! A conversation in progress.
//!
//! [`ChatSession`] owns one [`ChatRecord`] and keeps it in step with the
//! store: every change to the message tree is persisted as both the tree
//! (`history`) and its active path (`messages`). Replies are streamed from a
//! [`ChatBackend`], split into frames and appended to a placeholder node as
//! they arrive.

use futures::StreamExt;
use futures::future;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ChatBackend, ClientError};
use crate::history::{HistoryError, IdGenerator, build_history};
use crate::models::{ChatRecord, ChatUpdate, DEFAULT_CHAT_TITLE, History, MessageRecord, Role};
use crate::protocol::{ChatMessage, ChatRequest, ChunkDecoder, GenerateRequest, ProtocolError};
use crate::storage::{ChatStore, StoreError};
use crate::stream::{NEWLINE, SplitError, split_stream};

/// Generated titles longer than this are cut
const MAX_TITLE_CHARS: usize = 80;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("chat has no model selected")]
    NoModel,

    #[error("nothing to regenerate: the current message is not a reply to a prompt")]
    NothingToRegenerate,

    #[error("model server error: {0}")]
    Server(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Split(#[from] SplitError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// How a streamed reply ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Finished,
    Stopped,
}

pub struct ChatSession<S, G> {
    store: S,
    ids: G,
    chat: ChatRecord,
    title_auto_generate: bool,
    options: Option<Value>,
}

impl<S, G> ChatSession<S, G>
where
    S: ChatStore,
    G: IdGenerator,
{
    /// Start a new, empty chat and persist it
    pub fn create(store: S, model: &str, ids: G) -> Result<Self> {
        let chat = ChatRecord::new(uuid::Uuid::new_v4().to_string(), model);
        store.create_new_chat(&chat)?;
        info!(chat_id = %chat.id, model, "created chat");
        Ok(Self::from_parts(store, ids, chat))
    }

    /// Load a stored chat. Its stored tree is used when it is sound; otherwise
    /// the tree is rebuilt from the flat message list.
    pub fn open(store: S, chat_id: &str, mut ids: G) -> Result<Self> {
        let mut chat =
            store.get_chat_by_id(chat_id)?.ok_or_else(|| SessionError::ChatNotFound(chat_id.to_string()))?;

        let reusable = match chat.history.validate() {
            Ok(()) => !chat.history.is_empty(),
            Err(e) => {
                warn!(chat_id, error = %e, "stored history is inconsistent, rebuilding from messages");
                false
            }
        };
        if !reusable {
            chat.history = build_history(chat.messages.clone(), &mut ids);
            debug!(chat_id, nodes = chat.history.len(), "rebuilt history");
        }

        Ok(Self::from_parts(store, ids, chat))
    }

    fn from_parts(store: S, ids: G, chat: ChatRecord) -> Self {
        Self { store, ids, chat, title_auto_generate: true, options: None }
    }

    pub fn with_title_auto_generate(mut self, enabled: bool) -> Self {
        self.title_auto_generate = enabled;
        self
    }

    /// Model options sent with every chat request
    pub fn with_options(mut self, options: Option<Value>) -> Self {
        self.options = options;
        self
    }

    pub fn chat(&self) -> &ChatRecord {
        &self.chat
    }

    pub fn history(&self) -> &History {
        &self.chat.history
    }

    pub fn model(&self) -> Option<&str> {
        self.chat.models.first().map(String::as_str)
    }

    /// Switch the model used for the following requests
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        if self.model() == Some(model) {
            return Ok(());
        }
        let models = vec![model.to_string()];
        self.chat = self
            .store
            .update_chat_by_id(&self.chat.id, ChatUpdate { models: Some(models), ..ChatUpdate::default() })?;
        Ok(())
    }

    /// Send `prompt` as a new user turn and stream the reply. `on_delta`
    /// sees each piece of reply text as it arrives. Returns the reply's id.
    pub async fn submit_prompt<B, F>(&mut self, backend: &B, prompt: &str, on_delta: F) -> Result<String>
    where
        B: ChatBackend + ?Sized,
        F: FnMut(&str),
    {
        self.submit_prompt_until(backend, prompt, future::pending(), on_delta).await
    }

    /// [`submit_prompt`](Self::submit_prompt) that stops streaming once
    /// `stop` resolves. A stopped reply keeps the text received so far and
    /// is saved as done.
    pub async fn submit_prompt_until<B, Fut, F>(
        &mut self,
        backend: &B,
        prompt: &str,
        stop: Fut,
        on_delta: F,
    ) -> Result<String>
    where
        B: ChatBackend + ?Sized,
        Fut: Future<Output = ()>,
        F: FnMut(&str),
    {
        if prompt.trim().is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        let model = self.model().ok_or(SessionError::NoModel)?.to_string();

        let user_id = self.chat.history.push(MessageRecord::user(prompt), &mut self.ids)?;
        let reply_id = self.stream_reply(backend, &model, &user_id, stop, on_delta).await?;

        if self.wants_title() {
            self.generate_title(backend, &model, prompt).await;
        }
        Ok(reply_id)
    }

    /// Ask for another reply to the prompt the current reply answers. The
    /// new reply becomes a sibling of the current one.
    pub async fn regenerate_response<B, F>(&mut self, backend: &B, on_delta: F) -> Result<String>
    where
        B: ChatBackend + ?Sized,
        F: FnMut(&str),
    {
        self.regenerate_response_until(backend, future::pending(), on_delta).await
    }

    /// [`regenerate_response`](Self::regenerate_response) that stops
    /// streaming once `stop` resolves
    pub async fn regenerate_response_until<B, Fut, F>(&mut self, backend: &B, stop: Fut, on_delta: F) -> Result<String>
    where
        B: ChatBackend + ?Sized,
        Fut: Future<Output = ()>,
        F: FnMut(&str),
    {
        let model = self.model().ok_or(SessionError::NoModel)?.to_string();
        let prompt_id = self.regenerable_prompt().ok_or(SessionError::NothingToRegenerate)?;
        self.stream_reply(backend, &model, &prompt_id, stop, on_delta).await
    }

    fn regenerable_prompt(&self) -> Option<String> {
        let current = self.chat.history.current()?;
        if current.message.role != Role::Assistant {
            return None;
        }
        let parent = self.chat.history.get(current.parent_id.as_deref()?)?;
        (parent.message.role == Role::User).then(|| parent.id.clone())
    }

    /// Move the current reply `offset` versions back (negative) or forward,
    /// clamped at the ends. Returns the new current id.
    pub fn select_sibling(&mut self, offset: isize) -> Result<String> {
        let current = self.chat.history.current_id.clone().ok_or(HistoryError::MissingCurrent)?;
        let selected = self.chat.history.select_sibling(&current, offset)?;
        self.persist()?;
        Ok(selected)
    }

    pub fn rename(&mut self, title: &str) -> Result<()> {
        self.chat = self.store.update_chat_by_id(&self.chat.id, ChatUpdate::title(title))?;
        Ok(())
    }

    pub fn delete(self) -> Result<()> {
        self.store.delete_chat_by_id(&self.chat.id)?;
        info!(chat_id = %self.chat.id, "deleted chat");
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let update = ChatUpdate {
            messages: Some(self.chat.history.to_messages()?),
            history: Some(self.chat.history.clone()),
            ..ChatUpdate::default()
        };
        self.chat = self.store.update_chat_by_id(&self.chat.id, update)?;
        Ok(())
    }

    /// Add a placeholder reply under `parent_id`, fill it from the backend
    /// and persist the outcome either way
    async fn stream_reply<B, Fut, F>(
        &mut self,
        backend: &B,
        model: &str,
        parent_id: &str,
        stop: Fut,
        mut on_delta: F,
    ) -> Result<String>
    where
        B: ChatBackend + ?Sized,
        Fut: Future<Output = ()>,
        F: FnMut(&str),
    {
        let messages = self.chat.history.path_to(parent_id)?.into_iter().map(|n| ChatMessage::from(&n.message)).collect();
        let request =
            ChatRequest { model: model.to_string(), messages, stream: true, options: self.options.clone() };

        let reply_id =
            self.chat.history.append_child(Some(parent_id), MessageRecord::pending_reply(model), &mut self.ids)?;
        self.persist()?;

        let outcome = self.receive(backend, request, &reply_id, stop, &mut on_delta).await;

        if let Some(reply) = self.chat.history.get_mut(&reply_id) {
            let reply = &mut reply.message;
            reply.done = Some(true);
            match &outcome {
                Ok(Completion::Finished) => {}
                Ok(Completion::Stopped) => {
                    reply.extra.insert("stopped".to_string(), Value::Bool(true));
                }
                Err(e) => {
                    let text = e.to_string();
                    if reply.content_str().is_empty() {
                        reply.content = Some(text.clone());
                    }
                    reply.extra.insert("error".to_string(), Value::String(text));
                }
            }
        }

        let saved = self.persist();
        match outcome {
            Ok(completion) => {
                saved?;
                if completion == Completion::Stopped {
                    info!(chat_id = %self.chat.id, reply_id = %reply_id, "reply stopped");
                }
                Ok(reply_id)
            }
            Err(e) => {
                warn!(chat_id = %self.chat.id, error = %e, "reply failed");
                if let Err(store_error) = saved {
                    warn!(chat_id = %self.chat.id, error = %store_error, "failed to save the failed reply");
                }
                Err(e)
            }
        }
    }

    async fn receive<B, Fut, F>(
        &mut self,
        backend: &B,
        request: ChatRequest,
        reply_id: &str,
        stop: Fut,
        on_delta: &mut F,
    ) -> Result<Completion>
    where
        B: ChatBackend + ?Sized,
        Fut: Future<Output = ()>,
        F: FnMut(&str),
    {
        let chunks = backend.chat(request).await?;
        let mut frames = split_stream(chunks, NEWLINE)?;
        let mut decoder = ChunkDecoder::new();
        tokio::pin!(stop);

        loop {
            // The buffered partial frame is dropped on stop, not flushed
            let frame = tokio::select! {
                biased;
                () = &mut stop => return Ok(Completion::Stopped),
                frame = frames.next() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            let Some(chunk) = decoder.decode(&frame?)? else {
                continue;
            };
            if let Some(error) = &chunk.error {
                return Err(SessionError::Server(error.clone()));
            }

            let reply = self.reply_mut(reply_id)?;
            let delta = chunk.delta();
            if !delta.is_empty() {
                reply.push_content(delta);
                on_delta(delta);
            }
            if chunk.done {
                reply.extra.extend(chunk.stats());
                return Ok(Completion::Finished);
            }
        }

        debug!(chat_id = %self.chat.id, skipped = decoder.skipped(), "stream ended without a final frame");
        Ok(Completion::Finished)
    }

    fn reply_mut(&mut self, reply_id: &str) -> Result<&mut MessageRecord> {
        self.chat
            .history
            .get_mut(reply_id)
            .map(|node| &mut node.message)
            .ok_or_else(|| HistoryError::NodeNotFound(reply_id.to_string()).into())
    }

    /// Only the first completed exchange of a still-untitled chat gets a title
    fn wants_title(&self) -> bool {
        self.title_auto_generate
            && self.chat.title == DEFAULT_CHAT_TITLE
            && self.chat.messages.len() == 2
            && self.chat.messages.last().is_some_and(|m| !m.extra.contains_key("error"))
    }

    async fn generate_title<B>(&mut self, backend: &B, model: &str, prompt: &str)
    where
        B: ChatBackend + ?Sized,
    {
        let request =
            GenerateRequest { model: model.to_string(), prompt: title_prompt(prompt), stream: false, options: None };

        let title = match backend.generate(request).await {
            Ok(raw) => clean_title(&raw),
            Err(e) => {
                warn!(chat_id = %self.chat.id, error = %e, "title generation failed");
                return;
            }
        };
        let Some(title) = title else {
            debug!(chat_id = %self.chat.id, "model returned an empty title");
            return;
        };

        if let Err(e) = self.rename(&title) {
            warn!(chat_id = %self.chat.id, error = %e, "failed to store generated title");
        }
    }
}

pub fn title_prompt(user_prompt: &str) -> String {
    format!(
        "Generate a brief 3-5 word title for this question, excluding the term 'title.' \
         Then, please reply with only the title: {user_prompt}"
    )
}

/// First non-blank line of a model's answer, without surrounding quotes
fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let title = line.trim_matches(|c| c == '"' || c == '\'' || c == '*').trim();
    if title.is_empty() {
        return None;
    }
    Some(title.chars().take(MAX_TITLE_CHARS).collect())
}
