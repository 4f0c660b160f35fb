use reqwest::multipart::Form;

use crate::config::ChatConfig;
use crate::error::Result;
use crate::types::{ChatMessage, HistoryEntry};

/// Form field carrying the user identity.
pub const USER_ID_FIELD: &str = "user_id";
/// Form field carrying the conversation identity.
pub const CONVERSATION_ID_FIELD: &str = "conversation_id";
/// Form field carrying the prompt.
pub const PROMPT_FIELD: &str = "prompt";
/// Form field carrying the agent name.
pub const AGENT_NAME_FIELD: &str = "agent_name";
/// Form field carrying the JSON-encoded prior turns.
pub const CHAT_HISTORY_FIELD: &str = "chat_history";

/// The body of one chat submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Identity of the user.
    pub user_id: String,
    /// Identity of the conversation.
    pub conversation_id: String,
    /// The prompt being submitted.
    pub prompt: String,
    /// The agent addressed by the prompt.
    pub agent_name: String,
    /// JSON array of `{role, content}` for every finished prior turn.
    pub chat_history: String,
}

impl ChatRequest {
    /// Build the submission for `prompt`, serializing the finished turns of `history`.
    pub fn new(config: &ChatConfig, prompt: &str, history: &[ChatMessage]) -> Result<Self> {
        let chat_history = serde_json::to_string(&HistoryEntry::from_messages(history))?;
        Ok(Self {
            user_id: config.user_id.clone(),
            conversation_id: config.conversation_id.clone(),
            prompt: prompt.to_string(),
            agent_name: config.agent_name.clone(),
            chat_history,
        })
    }

    /// The form fields in submission order.
    pub fn form_fields(&self) -> [(&'static str, &str); 5] {
        [
            (USER_ID_FIELD, self.user_id.as_str()),
            (CONVERSATION_ID_FIELD, self.conversation_id.as_str()),
            (PROMPT_FIELD, self.prompt.as_str()),
            (AGENT_NAME_FIELD, self.agent_name.as_str()),
            (CHAT_HISTORY_FIELD, self.chat_history.as_str()),
        ]
    }

    /// The fields as a multipart form.
    pub fn to_multipart(&self) -> Form {
        self.form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name, value.to_string())
            })
    }
}
