//! Interactive chat application for talking to a customer-support agent.
//!
//! This binary provides a streaming REPL over a conversational-agent endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings; the token comes from the environment
//! CHATSTREAM_AUTH_TOKEN=token2 chatstream-chat
//!
//! # Point at a different endpoint and agent
//! chatstream-chat --api-endpoint http://localhost:9000/chat --agent-name Sam --auth-token t
//!
//! # Disable colors (useful for piping output)
//! chatstream-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Start over from the welcome message
//! - `/retry` - Clear a connection error
//! - `/history` - Show the conversation
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application
//!
//! Ctrl+C while a reply is streaming cancels it.  Set `RUST_LOG=chatstream=debug` to see the
//! client's logging on stderr.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use chatstream::chat::{
    ChatArgs, ChatCommand, ChatSession, PlainTextRenderer, Renderer, help_text, parse_command,
};
use chatstream::{BodyEncoding, ChatClient};

/// Main entry point for the chatstream-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatstream-chat [OPTIONS]");
    let use_color = args.use_color();
    let config = args.into_config()?;

    let client = ChatClient::new(config)?;
    let mut session = ChatSession::new(client);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C during a reply cancels the exchange; at the prompt rustyline sees it first.
    let canceller = session.client().clone();
    ctrlc::set_handler(move || {
        canceller.cancel();
    })?;

    println!(
        "Chat with {} at {}",
        session.agent_name(),
        session.client().config().api_endpoint
    );
    println!("Type /help for commands, /quit to exit\n");
    if let Some(welcome) = session.messages().first() {
        renderer.print_message(session.agent_name(), welcome);
    }

    loop {
        let prompt = if session.is_online() {
            "You: "
        } else {
            "You (offline): "
        };
        let readline = rl.readline(prompt);

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Retry => {
                            session.retry();
                            renderer.print_info("Connection error cleared.");
                        }
                        ChatCommand::History => {
                            let agent_name = session.agent_name().to_string();
                            for message in session.messages() {
                                renderer.print_message(&agent_name, message);
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Stats => {
                            print_stats(&session);
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&session);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                println!("{}:", session.agent_name());
                if let Err(e) = session.send_streaming(line, &mut renderer).await {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Agent: {}", stats.agent_name);
    println!("      Messages: {}", stats.message_count);
    println!("      User turns: {}", stats.user_turns);
    println!(
        "      Exchanges: {} completed / {} failed / {} cancelled",
        stats.completed_exchanges, stats.failed_exchanges, stats.cancelled_exchanges
    );
    println!(
        "      Status: {}",
        if stats.online { "online" } else { "offline" }
    );
    if let Some(error) = session.last_error() {
        println!("      Last error: {}", error);
    }
}

fn print_config(session: &ChatSession) {
    let config = session.client().config();
    println!("    Current Configuration:");
    println!("      Endpoint: {}", config.api_endpoint);
    println!("      User ID: {}", config.user_id);
    println!("      Conversation ID: {}", config.conversation_id);
    println!("      Agent: {}", config.agent_name);
    println!(
        "      Body encoding: {}",
        match config.body_encoding {
            BodyEncoding::Multipart => "multipart/form-data",
            BodyEncoding::UrlEncoded => "application/x-www-form-urlencoded",
        }
    );
    match config.connect_timeout {
        Some(timeout) => println!("      Connect timeout: {}ms", timeout.as_millis()),
        None => println!("      Connect timeout: (none)"),
    }
}
