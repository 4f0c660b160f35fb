//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so the session logic does not care
//! where output goes.  The default implementation writes to the terminal with optional ANSI
//! styling.  Reply text is printed as it arrives; no markdown is interpreted.

use std::io::{self, Stdout, Write};

use time::format_description::FormatItem;
use time::macros::format_description;

use crate::types::{ChatMessage, MessageRole};

/// ANSI escape code for dim text (used for informational output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as increments arrive from the agent.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a finished turn, e.g. when showing the history.
    fn print_message(&mut self, agent_name: &str, message: &ChatMessage);

    /// Called when a reply is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);

    /// Called when the reply was cancelled by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn end_line(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn print_message(&mut self, agent_name: &str, message: &ChatMessage) {
        self.end_line();
        let speaker = match message.role {
            MessageRole::User => "You",
            MessageRole::Assistant => agent_name,
        };
        let time = message
            .timestamp
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_default();
        let suffix = if message.is_streaming() {
            " [unfinished]"
        } else {
            ""
        };
        if self.use_color {
            println!(
                "{ANSI_DIM}{time}{ANSI_RESET} {ANSI_BOLD}{speaker}:{ANSI_RESET} {}{ANSI_DIM}{suffix}{ANSI_RESET}",
                message.content
            );
        } else {
            println!("{time} {speaker}: {}{suffix}", message.content);
        }
    }

    fn finish_response(&mut self) {
        self.end_line();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        println!("[interrupted]");
    }
}
