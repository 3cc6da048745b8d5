//! Language model response generation.
//!
//! The pipeline hands a [`ConversationContext`] to a [`ResponseGenerator`]:
//! an emotion-conditioned system prompt, the persisted history oldest
//! first, and the new user utterance last.

pub mod chat_api;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use chat_api::ChatApiGenerator;

/// Author of a chat message as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the model sees for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationContext {
    pub system_prompt: String,
    /// History oldest-first; the final entry is the current user turn.
    pub messages: Vec<ChatMessage>,
}

impl ConversationContext {
    /// The full message list with the system prompt first.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut all = Vec::with_capacity(self.messages.len() + 1);
        all.push(ChatMessage::system(self.system_prompt.clone()));
        all.extend(self.messages.iter().cloned());
        all
    }

    /// The utterance being answered.
    pub fn current_user_turn(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Produces an assistant reply for a conversation.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// # Errors
    ///
    /// Fails with [`crate::error::AttuneError::Generation`].
    async fn generate(&self, context: &ConversationContext) -> Result<String>;
}
