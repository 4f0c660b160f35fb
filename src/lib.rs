// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod observability;
pub mod sse;
pub mod types;

// Re-exports
pub use client::ChatClient;
pub use client_logger::ClientLogger;
pub use config::{BodyEncoding, ChatConfig};
pub use decoder::{ExchangeOutcome, StreamDecoder};
pub use error::{Error, Result};
pub use handler::{Callbacks, StreamHandler};
pub use observability::register_biometrics;
pub use sse::{Increment, IncrementSource, LineAction, LineBuffer, SseLine};
pub use types::*;
