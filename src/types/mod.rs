// Public modules
pub mod chat_message;
pub mod chat_request;
pub mod history_entry;
pub mod message_role;

// Re-exports
pub use chat_message::ChatMessage;
pub use chat_request::{
    AGENT_NAME_FIELD, CHAT_HISTORY_FIELD, CONVERSATION_ID_FIELD, ChatRequest, PROMPT_FIELD,
    USER_ID_FIELD,
};
pub use history_entry::HistoryEntry;
pub use message_role::MessageRole;
