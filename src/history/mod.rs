//! Persisted chat history and the display formatter.
//!
//! Messages are stored one per utterance. The store is free to return them
//! in any order; every consumer here re-establishes logical order from the
//! store-assigned `seq` before pairing user and assistant turns.

pub mod schema;
pub mod sqlite;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttuneError;
use crate::session::SessionId;

pub use sqlite::SqliteHistoryStore;
pub use store::{HistoryStore, MemoryHistoryStore};

/// Shown in place of an emotion for user messages persisted without one.
pub const NO_EMOTION_PLACEHOLDER: &str = "🤖";

/// Length of a session preview before it is truncated.
const PREVIEW_CHARS: usize = 50;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AttuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(AttuneError::Persistence(format!("unknown role: {other}"))),
        }
    }
}

/// A message to be appended; the store assigns `seq` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    /// Emotion display string; only meaningful on user messages.
    pub emotion: Option<String>,
}

impl NewMessage {
    pub fn user(
        session_id: SessionId,
        content: impl Into<String>,
        emotion: Option<String>,
    ) -> Self {
        Self {
            session_id,
            role: Role::User,
            content: content.into(),
            emotion,
        }
    }

    pub fn assistant(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            session_id,
            role: Role::Assistant,
            content: content.into(),
            emotion: None,
        }
    }
}

/// One persisted utterance. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned insertion sequence; defines logical order.
    pub seq: u64,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub emotion: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A paired (user, assistant) exchange for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTurn {
    pub user_text: String,
    pub emotion_display: String,
    pub response_text: String,
}

/// Borrow messages in insertion order, whatever order the store returned
/// them in. Stable for equal `seq`.
pub fn logical_order(messages: &[Message]) -> Vec<&Message> {
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.seq);
    ordered
}

/// Pair user messages with the assistant reply that follows them.
///
/// An unmatched user message is replaced by a newer one; an assistant
/// message with no pending user message is dropped. Neither is an error.
pub fn format_chat_history(messages: &[Message]) -> Vec<DisplayTurn> {
    let ordered = logical_order(messages);

    let mut turns = Vec::new();
    let mut pending_user: Option<&Message> = None;
    for message in ordered {
        match message.role {
            Role::User => pending_user = Some(message),
            Role::Assistant => {
                if let Some(user) = pending_user.take() {
                    turns.push(DisplayTurn {
                        user_text: user.content.clone(),
                        emotion_display: user
                            .emotion
                            .clone()
                            .unwrap_or_else(|| NO_EMOTION_PLACEHOLDER.to_owned()),
                        response_text: message.content.clone(),
                    });
                }
            }
        }
    }
    turns
}

/// The most recent completed exchange, if any.
pub fn latest_turn(messages: &[Message]) -> Option<DisplayTurn> {
    format_chat_history(messages).pop()
}

/// Short label for a session: its first user message, or its id prefix.
pub fn session_preview(session_id: &SessionId, messages: &[Message]) -> String {
    let ordered = logical_order(messages);
    match ordered.iter().find(|m| m.role == Role::User) {
        Some(first) if first.content.chars().count() > PREVIEW_CHARS => {
            let head: String = first.content.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        }
        Some(first) => first.content.clone(),
        None => format!("Session {}", session_id.short()),
    }
}
