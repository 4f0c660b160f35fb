//! Connection settings for a [`ChatClient`](crate::ChatClient).
//!
//! The five identity fields are opaque strings.  They are checked for presence and nothing
//! else; the endpoint is only parsed when the client is built.

use std::time::Duration;

use crate::error::{Error, Result};

/// How the form body of a chat request is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// `multipart/form-data`.
    #[default]
    Multipart,
    /// `application/x-www-form-urlencoded`.
    UrlEncoded,
}

/// Configuration for one chat client.
///
/// A client copies its configuration when it is built; changing the configuration means
/// building a new client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Identity of the user sending prompts.
    pub user_id: String,

    /// Identity of the conversation on the agent side.
    pub conversation_id: String,

    /// Display name of the agent, also sent with every request.
    pub agent_name: String,

    /// URL the chat requests are POSTed to.
    pub api_endpoint: String,

    /// Bearer credential for the `Authorization` header.
    pub auth_token: String,

    /// Encoding of the request body.
    pub body_encoding: BodyEncoding,

    /// Optional limit on establishing the connection.  There is never a limit on the stream.
    pub connect_timeout: Option<Duration>,
}

impl ChatConfig {
    /// Creates a configuration with the default transport settings.
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        agent_name: impl Into<String>,
        api_endpoint: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            agent_name: agent_name.into(),
            api_endpoint: api_endpoint.into(),
            auth_token: auth_token.into(),
            body_encoding: BodyEncoding::default(),
            connect_timeout: None,
        }
    }

    /// Sets the body encoding.
    pub fn with_body_encoding(mut self, body_encoding: BodyEncoding) -> Self {
        self.body_encoding = body_encoding;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("user_id", &self.user_id),
            ("conversation_id", &self.conversation_id),
            ("agent_name", &self.agent_name),
            ("api_endpoint", &self.api_endpoint),
            ("auth_token", &self.auth_token),
        ];
        for (param, value) in required {
            if value.is_empty() {
                return Err(Error::validation(
                    format!("{param} is required"),
                    Some(param.to_string()),
                ));
            }
        }
        Ok(())
    }
}
