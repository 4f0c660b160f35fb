use serde::Serialize;

use crate::types::{ChatMessage, MessageRole};

/// A prior turn as it is sent in the `chat_history` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryEntry<'a> {
    /// The author of the turn.
    pub role: MessageRole,

    /// The text of the turn.
    pub content: &'a str,
}

impl<'a> HistoryEntry<'a> {
    /// Build the ordered history payload, leaving out turns that are still streaming.
    pub fn from_messages(messages: &'a [ChatMessage]) -> Vec<HistoryEntry<'a>> {
        messages
            .iter()
            .filter(|message| !message.is_streaming())
            .map(HistoryEntry::from)
            .collect()
    }
}

impl<'a> From<&'a ChatMessage> for HistoryEntry<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}
