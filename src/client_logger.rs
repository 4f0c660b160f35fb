//! Logging trait for chat client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! every exchange passing through a [`ChatClient`](crate::ChatClient): what was sent, every
//! line that came back, what was delivered, and how the exchange ended.

use crate::ExchangeOutcome;
use crate::sse::Increment;
use crate::types::ChatRequest;

/// A trait for logging chat client operations.
///
/// Implement this trait to record the raw traffic of an exchange, for instance when debugging
/// an upstream service that mixes framing conventions.
///
/// # Example
///
/// ```rust,ignore
/// use chatstream::{ChatRequest, ClientLogger, ExchangeOutcome, Increment};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Prompt: {}", request.prompt).unwrap();
///     }
///
///     fn log_line(&self, line: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Line: {line}").unwrap();
///     }
///
///     fn log_increment(&self, increment: &Increment) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Increment ({:?}): {}", increment.source, increment.text).unwrap();
///     }
///
///     fn log_outcome(&self, outcome: ExchangeOutcome) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Outcome: {outcome:?}").unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log the body of a request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log a complete line of the response body.
    ///
    /// This method is called for every line, including comments and blank lines, before the
    /// line is interpreted.
    fn log_line(&self, line: &str);

    /// Log an increment just before it is delivered to the handler.
    fn log_increment(&self, increment: &Increment);

    /// Log how the exchange ended.
    ///
    /// This method is called exactly once per exchange, cancelled exchanges included.
    fn log_outcome(&self, outcome: ExchangeOutcome);
}
