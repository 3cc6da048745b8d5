//! History storage trait and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Message, NewMessage};
use crate::error::Result;
use crate::session::SessionId;

/// Append-only store of chat messages.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist one message, assigning its `seq` and `created_at`.
    async fn append(&self, message: NewMessage) -> Result<Message>;

    /// Persist a completed exchange atomically: both messages are written,
    /// in order, or neither is.
    async fn append_turn(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(Message, Message)>;

    /// All messages for a session. Order is unspecified; callers sort by `seq`.
    async fn read(&self, session_id: &SessionId) -> Result<Vec<Message>>;

    /// Every session with at least one message, oldest first.
    async fn list_sessions(&self) -> Result<Vec<SessionId>>;
}

/// In-memory history for tests and ephemeral runs.
///
/// Cheaply cloneable; clones share the same messages.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    inner: Arc<RwLock<Vec<Message>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push(messages: &mut Vec<Message>, message: NewMessage) -> Message {
    let seq = messages.last().map_or(1, |m| m.seq + 1);
    let stored = Message {
        seq,
        session_id: message.session_id,
        role: message.role,
        content: message.content,
        emotion: message.emotion,
        created_at: Utc::now(),
    };
    messages.push(stored.clone());
    stored
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, message: NewMessage) -> Result<Message> {
        let mut messages = self.inner.write().await;
        Ok(push(&mut messages, message))
    }

    async fn append_turn(
        &self,
        user: NewMessage,
        assistant: NewMessage,
    ) -> Result<(Message, Message)> {
        let mut messages = self.inner.write().await;
        let user = push(&mut messages, user);
        let assistant = push(&mut messages, assistant);
        Ok((user, assistant))
    }

    async fn read(&self, session_id: &SessionId) -> Result<Vec<Message>> {
        Ok(self
            .inner
            .read()
            .await
            .iter()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let messages = self.inner.read().await;
        let mut seen: Vec<SessionId> = Vec::new();
        for m in messages.iter() {
            if !seen.contains(&m.session_id) {
                seen.push(m.session_id.clone());
            }
        }
        Ok(seen)
    }
}
