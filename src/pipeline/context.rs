//! Builds the model context for a reply.

use crate::history::{Message, Role, logical_order};
use crate::llm::{ChatMessage, ConversationContext};

/// Placeholder in the system prompt template replaced by the emotion label.
pub const EMOTION_PLACEHOLDER: &str = "{emotion}";

/// Fill the system prompt template with the detected emotion.
pub fn render_system_prompt(template: &str, emotion_label: &str) -> String {
    template.replace(EMOTION_PLACEHOLDER, emotion_label)
}

/// Persisted history in logical order, then the current transcript as the
/// final user turn.
pub fn build_context(
    template: &str,
    emotion_label: &str,
    history: &[Message],
    transcript: &str,
) -> ConversationContext {
    let mut messages: Vec<ChatMessage> = logical_order(history)
        .into_iter()
        .map(|m| match m.role {
            Role::User => ChatMessage::user(m.content.clone()),
            Role::Assistant => ChatMessage::assistant(m.content.clone()),
        })
        .collect();
    messages.push(ChatMessage::user(transcript));

    ConversationContext {
        system_prompt: render_system_prompt(template, emotion_label),
        messages,
    }
}
