//! Chat application module for interactive conversations with a support agent.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! chatstream client library. It supports:
//!
//! - Streaming replies printed as they arrive
//! - Cancelling a reply mid-stream
//! - Slash commands for session control
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation state and exchanges with the agent
//! - [`commands`]: Slash command parsing
//! - [`render`]: Terminal output

mod commands;
mod config;
mod render;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    AUTH_TOKEN_ENV, ChatArgs, DEFAULT_AGENT_NAME, DEFAULT_API_ENDPOINT, DEFAULT_CONVERSATION_ID,
    DEFAULT_USER_ID,
};
pub use render::{PlainTextRenderer, Renderer};
pub use session::{ChatSession, SessionStats, WELCOME_ID};
