//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and resolves the arguments into the
//! [`ChatConfig`] a client is built from.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::config::{BodyEncoding, ChatConfig};
use crate::error::Result;

/// Environment variable consulted when `--auth-token` is not given.
pub const AUTH_TOKEN_ENV: &str = "CHATSTREAM_AUTH_TOKEN";

/// Default chat endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "http://0.0.0.0:8081/chat";

/// Default user identity.
pub const DEFAULT_USER_ID: &str = "imagine-gitbook-docs";

/// Default conversation identity.
pub const DEFAULT_CONVERSATION_ID: &str = "customer-support-bot";

/// Default agent name.
pub const DEFAULT_AGENT_NAME: &str = "Alex";

/// Command-line arguments for the chatstream-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Endpoint the chat requests are POSTed to.
    #[arrrg(optional, "Chat endpoint (default: http://0.0.0.0:8081/chat)", "URL")]
    pub api_endpoint: Option<String>,

    /// Bearer token for the endpoint.
    #[arrrg(optional, "Bearer token (default: $CHATSTREAM_AUTH_TOKEN)", "TOKEN")]
    pub auth_token: Option<String>,

    /// User identity.
    #[arrrg(optional, "User ID (default: imagine-gitbook-docs)", "ID")]
    pub user_id: Option<String>,

    /// Conversation identity.
    #[arrrg(optional, "Conversation ID (default: customer-support-bot)", "ID")]
    pub conversation_id: Option<String>,

    /// Agent display name.
    #[arrrg(optional, "Agent name (default: Alex)", "NAME")]
    pub agent_name: Option<String>,

    /// Limit on establishing the connection, in milliseconds.
    #[arrrg(optional, "Connect timeout in milliseconds (default: none)", "MILLIS")]
    pub connect_timeout_ms: Option<u64>,

    /// Send the form urlencoded instead of as multipart.
    #[arrrg(flag, "Send application/x-www-form-urlencoded bodies")]
    pub urlencoded: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

impl ChatArgs {
    /// Whether output should be styled.
    pub fn use_color(&self) -> bool {
        !self.no_color
    }

    /// Resolves the arguments into a validated configuration.
    ///
    /// The auth token falls back to the `CHATSTREAM_AUTH_TOKEN` environment variable.
    pub fn into_config(self) -> Result<ChatConfig> {
        let env_token = std::env::var(AUTH_TOKEN_ENV).ok();
        self.resolve(env_token)
    }

    fn resolve(self, env_token: Option<String>) -> Result<ChatConfig> {
        let body_encoding = if self.urlencoded {
            BodyEncoding::UrlEncoded
        } else {
            BodyEncoding::Multipart
        };
        let config = ChatConfig::new(
            self.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            self.conversation_id
                .unwrap_or_else(|| DEFAULT_CONVERSATION_ID.to_string()),
            self.agent_name
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            self.api_endpoint
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            self.auth_token.or(env_token).unwrap_or_default(),
        )
        .with_body_encoding(body_encoding)
        .with_connect_timeout(self.connect_timeout_ms.map(Duration::from_millis));
        config.validate()?;
        Ok(config)
    }
}
