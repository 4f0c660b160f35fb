use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, Url};
use tokio_util::sync::CancellationToken;

use crate::client_logger::ClientLogger;
use crate::config::{BodyEncoding, ChatConfig};
use crate::decoder::{ExchangeOutcome, StreamDecoder};
use crate::error::{Error, Result};
use crate::handler::StreamHandler;
use crate::observability::{
    CLIENT_CANCELLATIONS, CLIENT_EXCHANGE_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::types::{ChatMessage, ChatRequest};

/// Header that routes the request to the agent service.
pub const ROUTING_HEADER: &str = "x-ml-internal";

const EVENT_STREAM: &str = "text/event-stream";
const MAX_ERROR_BODY: usize = 512;

/// Client for a conversational-agent endpoint.
///
/// At most one exchange is in flight per client.  [`send`](ChatClient::send) cancels the
/// previous exchange before it starts a new one, and [`cancel`](ChatClient::cancel) ends the
/// current one silently.  Clones share the in-flight exchange, so a clone can cancel what another
/// handle is awaiting.
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ChatConfig>,
    endpoint: Url,
    headers: HeaderMap,
    client: ReqwestClient,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_exchange: Arc<AtomicU64>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// Fails when a required configuration field is missing, the endpoint is not a URL, or the
    /// token cannot be sent as a header.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Self::with_http_client(config, client)
    }

    /// Create a new client on top of an existing HTTP client.
    pub fn with_http_client(config: ChatConfig, client: ReqwestClient) -> Result<Self> {
        config.validate()?;
        let endpoint = Url::parse(&config.api_endpoint)?;
        let headers = Self::default_headers(&config)?;
        Ok(Self {
            config: Arc::new(config),
            endpoint,
            headers,
            client,
            in_flight: Arc::new(Mutex::new(None)),
            next_exchange: Arc::new(AtomicU64::new(0)),
            logger: None,
        })
    }

    /// Attach a logger for every exchange this client runs.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns true while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Abort the in-flight exchange, if any.
    ///
    /// The aborted [`send`](ChatClient::send) resolves to [`ExchangeOutcome::Cancelled`] without
    /// calling `on_complete` or `on_error`.  Calling this with nothing in flight does nothing.
    pub fn cancel(&self) {
        let previous = lock(&self.in_flight).take();
        if let Some(in_flight) = previous {
            CLIENT_CANCELLATIONS.click();
            tracing::debug!(exchange = in_flight.id, "cancelling in-flight exchange");
            in_flight.cancel.cancel();
        }
    }

    /// Submit `prompt` with the finished turns of `history` and stream the reply into `handler`.
    ///
    /// Any exchange still in flight is cancelled first.  Failures, including non-success HTTP
    /// statuses, are reported through `handler.on_error`; nothing is retried.
    pub async fn send<H>(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        handler: &mut H,
    ) -> ExchangeOutcome
    where
        H: StreamHandler + ?Sized,
    {
        let exchange = self.begin_exchange();
        let started = Instant::now();
        CLIENT_REQUESTS.click();
        tracing::debug!(exchange = exchange.id, "starting exchange");

        let outcome = self
            .exchange(prompt, history, &exchange.cancel, started, handler)
            .await;

        CLIENT_EXCHANGE_DURATION.add(started.elapsed().as_secs_f64());
        if outcome == ExchangeOutcome::Failed {
            CLIENT_REQUEST_ERRORS.click();
        }
        if let Some(logger) = &self.logger {
            logger.log_outcome(outcome);
        }
        tracing::debug!(exchange = exchange.id, ?outcome, "exchange finished");
        outcome
    }

    async fn exchange<H>(
        &self,
        prompt: &str,
        history: &[ChatMessage],
        cancel: &CancellationToken,
        started: Instant,
        handler: &mut H,
    ) -> ExchangeOutcome
    where
        H: StreamHandler + ?Sized,
    {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ExchangeOutcome::Cancelled,
            opened = self.open(prompt, history) => opened,
        };
        let response = match opened {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "chat request failed");
                handler.on_error(err.or_unknown());
                return ExchangeOutcome::Failed;
            }
        };

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        StreamDecoder::new(cancel.clone())
            .started_at(started)
            .with_logger(self.logger.clone())
            .run(body, handler)
            .await
    }

    /// Issue the POST and wait for a successful status.
    async fn open(&self, prompt: &str, history: &[ChatMessage]) -> Result<Response> {
        let request = ChatRequest::new(&self.config, prompt, history)?;
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }

        let builder = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone());
        let builder = match self.config.body_encoding {
            BodyEncoding::Multipart => builder.multipart(request.to_multipart()),
            BodyEncoding::UrlEncoded => builder.form(&request.form_fields()),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {e}"),
                    self.config.connect_timeout.map(|t| t.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
            }
        })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    fn default_headers(config: &ChatConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(ROUTING_HEADER, HeaderValue::from_static("true"));
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.auth_token))
            .map_err(|_| {
                Error::validation(
                    "auth_token contains characters not allowed in a header",
                    Some("auth_token".to_string()),
                )
            })?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);
        Ok(headers)
    }

    /// Turn a non-success response into an error carrying its status and body.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let body = response.text().await.unwrap_or_default();
        let mut message = body.trim().to_string();
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or_default().to_string();
        }
        if message.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Error::api(status.as_u16(), message, request_id)
    }

    /// Cancel whatever is in flight and install a fresh handle for a new exchange.
    fn begin_exchange(&self) -> ExchangeGuard {
        let id = self.next_exchange.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = lock(&self.in_flight).replace(InFlight {
            id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            CLIENT_CANCELLATIONS.click();
            tracing::debug!(
                exchange = previous.id,
                "cancelling in-flight exchange for a new one"
            );
            previous.cancel.cancel();
        }
        ExchangeGuard {
            id,
            cancel,
            slot: Arc::clone(&self.in_flight),
        }
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("user_id", &self.config.user_id)
            .field("conversation_id", &self.config.conversation_id)
            .field("agent_name", &self.config.agent_name)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// The cancellation handle of the exchange currently in flight.
struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

/// Clears the in-flight slot when an exchange ends, however it ends.
///
/// The slot is only cleared while it still belongs to this exchange; a newer exchange may
/// already have replaced it.
struct ExchangeGuard {
    id: u64,
    cancel: CancellationToken,
    slot: Arc<Mutex<Option<InFlight>>>,
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot
            .as_ref()
            .is_some_and(|in_flight| in_flight.id == self.id)
        {
            *slot = None;
        }
    }
}

fn lock(slot: &Mutex<Option<InFlight>>) -> MutexGuard<'_, Option<InFlight>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
