//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which keeps the conversation, drives one
//! exchange per user turn through a [`ChatClient`], and tracks whether the endpoint is in a
//! connection-error state.

use crate::chat::render::Renderer;
use crate::client::ChatClient;
use crate::decoder::ExchangeOutcome;
use crate::error::{Error, Result};
use crate::handler::StreamHandler;
use crate::types::{ChatMessage, MessageRole};

/// Identifier of the greeting that opens every conversation.
pub const WELCOME_ID: &str = "welcome";

/// A chat session that manages conversation state and exchanges with the agent.
///
/// The conversation always opens with a greeting from the agent.  That greeting is part of
/// the history sent with later prompts.
#[derive(Debug)]
pub struct ChatSession {
    client: ChatClient,
    messages: Vec<ChatMessage>,
    last_error: Option<String>,
    next_id: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The agent the session talks to.
    pub agent_name: String,
    /// The number of messages in the conversation, greeting included.
    pub message_count: usize,
    /// The number of user turns in the conversation.
    pub user_turns: usize,
    /// Exchanges that ran to completion.
    pub completed_exchanges: u64,
    /// Exchanges that ended in an error.
    pub failed_exchanges: u64,
    /// Exchanges the user cancelled.
    pub cancelled_exchanges: u64,
    /// False while a connection error is unresolved.
    pub online: bool,
}

impl ChatSession {
    /// Creates a new chat session that starts with the agent's greeting.
    pub fn new(client: ChatClient) -> Self {
        let messages = vec![welcome_message(&client.config().agent_name)];
        Self {
            client,
            messages,
            last_error: None,
            next_id: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
        }
    }

    /// Sends a user message and streams the reply into `renderer`.
    ///
    /// The history sent with the prompt is the conversation as it stood before this turn, minus
    /// any reply that never finished.  On failure the placeholder reply is removed and the error
    /// is kept until [`retry`](ChatSession::retry) clears it.  On cancellation the partial reply
    /// stays in the conversation but is never sent as history.
    ///
    /// # Errors
    ///
    /// Returns an error without contacting the endpoint if the input is blank or a connection
    /// error is unresolved.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<ExchangeOutcome> {
        let prompt = user_input.trim();
        if prompt.is_empty() {
            return Err(Error::validation("message is empty", None));
        }
        if let Some(error) = &self.last_error {
            return Err(Error::connection(
                format!("{error} (use /retry to reconnect)"),
                None,
            ));
        }

        let history = self.messages.clone();
        let turn = self.next_turn();
        self.messages
            .push(ChatMessage::user(format!("user-{turn}"), prompt));
        self.messages
            .push(ChatMessage::streaming_assistant(format!("bot-{turn}")));

        let mut handler = TurnHandler {
            renderer: &mut *renderer,
            reply: self.messages.last_mut(),
            error: None,
        };
        let outcome = self.client.send(prompt, &history, &mut handler).await;
        let error = handler.error.take();

        match outcome {
            ExchangeOutcome::Completed => {
                self.completed += 1;
            }
            ExchangeOutcome::Failed => {
                self.failed += 1;
                self.messages.pop();
                let message = error
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "Failed to send message".to_string());
                tracing::warn!(error = %message, "exchange failed");
                renderer.print_error(&message);
                self.last_error = Some(message);
            }
            ExchangeOutcome::Cancelled => {
                self.cancelled += 1;
                renderer.print_interrupted();
            }
        }
        Ok(outcome)
    }

    /// Clears the connection error and drops every reply that never finished.
    pub fn retry(&mut self) {
        self.last_error = None;
        self.messages.retain(|message| !message.is_streaming());
    }

    /// Resets the conversation to the greeting.
    pub fn clear(&mut self) {
        self.messages = vec![welcome_message(&self.client.config().agent_name)];
        self.last_error = None;
    }

    /// The conversation so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The unresolved connection error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns false while a connection error is unresolved.
    pub fn is_online(&self) -> bool {
        self.last_error.is_none()
    }

    /// The client this session sends through.
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// The name of the agent.
    pub fn agent_name(&self) -> &str {
        &self.client.config().agent_name
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            agent_name: self.agent_name().to_string(),
            message_count: self.message_count(),
            user_turns: self
                .messages
                .iter()
                .filter(|message| message.role == MessageRole::User)
                .count(),
            completed_exchanges: self.completed,
            failed_exchanges: self.failed,
            cancelled_exchanges: self.cancelled,
            online: self.is_online(),
        }
    }

    fn next_turn(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn welcome_message(agent_name: &str) -> ChatMessage {
    ChatMessage::assistant(
        WELCOME_ID,
        format!(
            "Hello! I'm **{agent_name}**, your customer support assistant. How can I help you today?"
        ),
    )
}

/// Accumulates one reply into its placeholder while rendering it.
struct TurnHandler<'a> {
    renderer: &'a mut dyn Renderer,
    reply: Option<&'a mut ChatMessage>,
    error: Option<Error>,
}

impl StreamHandler for TurnHandler<'_> {
    fn on_chunk(&mut self, text: &str) {
        if let Some(reply) = self.reply.as_deref_mut() {
            reply.push_str(text);
        }
        self.renderer.print_text(text);
    }

    fn on_complete(&mut self) {
        if let Some(reply) = self.reply.as_deref_mut() {
            reply.finish();
        }
        self.renderer.finish_response();
    }

    fn on_error(&mut self, error: Error) {
        self.error = Some(error);
    }
}
