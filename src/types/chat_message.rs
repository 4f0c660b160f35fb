use time::OffsetDateTime;

use crate::types::MessageRole;

/// One turn of a conversation as the front end keeps it.
///
/// Only `role` and `content` travel to the endpoint, and only once the turn is no longer
/// streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Locally unique identifier of the turn.
    pub id: String,

    /// The author of the turn.
    pub role: MessageRole,

    /// The text of the turn; grows while the turn is streaming.
    pub content: String,

    /// When the turn was created.
    pub timestamp: OffsetDateTime,

    /// Set while the assistant reply is still arriving.
    pub streaming: bool,
}

impl ChatMessage {
    /// Create a finished turn.
    pub fn new(id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            streaming: false,
        }
    }

    /// Create a finished user turn.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::User, content)
    }

    /// Create a finished assistant turn.
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::Assistant, content)
    }

    /// Create an empty assistant turn that is still streaming.
    pub fn streaming_assistant(id: impl Into<String>) -> Self {
        Self {
            streaming: true,
            ..Self::assistant(id, "")
        }
    }

    /// Returns true while the turn is still streaming.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Append one increment to the turn.
    pub fn push_str(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Mark the turn as complete.
    pub fn finish(&mut self) {
        self.streaming = false;
    }
}
