//! Incremental decoding of a response body into reply increments.
//!
//! A [`StreamDecoder`] owns one decode session: a [`LineBuffer`] and the cancellation token of
//! the exchange.  It reads the body chunk by chunk, hands every complete line to
//! [`interpret_line`], and reports to a [`StreamHandler`].  The read is the only suspension
//! point and is raced against the token, so a cancel takes effect at the next read at the
//! latest.

use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::handler::StreamHandler;
use crate::observability::{
    STREAM_BYTES, STREAM_ERRORS, STREAM_FALLBACKS, STREAM_INCREMENTS, STREAM_LINES, STREAM_TTFB,
};
use crate::sse::{IncrementSource, LineAction, LineBuffer, interpret_line};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The sentinel arrived or the body ended; `on_complete` was called.
    Completed,
    /// The exchange failed; `on_error` was called.
    Failed,
    /// The exchange was cancelled; neither terminal callback was called.
    Cancelled,
}

/// Decodes one response body.
pub struct StreamDecoder {
    buffer: LineBuffer,
    cancel: CancellationToken,
    logger: Option<Arc<dyn ClientLogger>>,
    started: Instant,
    first_chunk_seen: bool,
}

impl StreamDecoder {
    /// Creates a decoder that stops as soon as `cancel` fires.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            buffer: LineBuffer::new(),
            cancel,
            logger: None,
            started: Instant::now(),
            first_chunk_seen: false,
        }
    }

    /// Measures time to first byte from `started` instead of from construction.
    ///
    /// The client passes the instant the request was issued, so the measurement covers the
    /// connect and the response headers as well as the wait for the first body chunk.
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Attaches a logger that sees every line and increment.
    pub fn with_logger(mut self, logger: Option<Arc<dyn ClientLogger>>) -> Self {
        self.logger = logger;
        self
    }

    /// Reads `stream` to its end, the sentinel, a failure, or cancellation.
    ///
    /// Exactly one of `on_complete` and `on_error` is called unless the exchange is cancelled,
    /// in which case the decoder returns without calling either.
    pub async fn run<S, H>(mut self, stream: S, handler: &mut H) -> ExchangeOutcome
    where
        S: Stream<Item = Result<Bytes>>,
        H: StreamHandler + ?Sized,
    {
        match self.drive(stream, handler).await {
            Ok(()) => {
                handler.on_complete();
                ExchangeOutcome::Completed
            }
            Err(err) if err.is_abort() => {
                tracing::debug!("stream decoding cancelled");
                ExchangeOutcome::Cancelled
            }
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::warn!(error = %err, "stream decoding failed");
                handler.on_error(err.or_unknown());
                ExchangeOutcome::Failed
            }
        }
    }

    async fn drive<S, H>(&mut self, stream: S, handler: &mut H) -> Result<()>
    where
        S: Stream<Item = Result<Bytes>>,
        H: StreamHandler + ?Sized,
    {
        let mut stream = pin!(stream);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::abort("exchange cancelled")),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                if let Some(rest) = std::mem::take(&mut self.buffer).finish() {
                    tracing::debug!(partial = %rest, "discarding unterminated final line");
                }
                return Ok(());
            };
            let bytes = chunk?;
            self.observe_chunk(&bytes);

            for line in self.buffer.push(&bytes) {
                if self.cancel.is_cancelled() {
                    return Err(Error::abort("exchange cancelled"));
                }
                STREAM_LINES.click();
                tracing::trace!(line = %line, "received line");
                if let Some(logger) = &self.logger {
                    logger.log_line(&line);
                }
                match interpret_line(&line) {
                    LineAction::Emit(increment) => {
                        STREAM_INCREMENTS.click();
                        if increment.source == IncrementSource::RawPayload {
                            STREAM_FALLBACKS.click();
                            tracing::debug!(payload = %increment.text, "non-JSON data payload");
                        }
                        if let Some(logger) = &self.logger {
                            logger.log_increment(&increment);
                        }
                        handler.on_chunk(&increment.text);
                    }
                    LineAction::Done => {
                        tracing::debug!("received end-of-stream sentinel");
                        return Ok(());
                    }
                    LineAction::Skip => {}
                }
            }
        }
    }

    /// Counts `bytes` and returns the time to first byte when this is the first chunk.
    fn observe_chunk(&mut self, bytes: &Bytes) -> Option<Duration> {
        STREAM_BYTES.count(bytes.len() as u64);
        if self.first_chunk_seen {
            return None;
        }
        self.first_chunk_seen = true;
        let ttfb = self.started.elapsed();
        STREAM_TTFB.add(ttfb.as_secs_f64());
        Some(ttfb)
    }
}
