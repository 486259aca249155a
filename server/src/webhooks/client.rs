//! Webhook Relay Client
//!
//! Calls a partner webhook in one of two modes:
//! - buffered: POST JSON, wait for a `{"reply": ...}` body, normalise it into a
//!   [`RunResult`];
//! - streaming: POST JSON, expect `text/event-stream`, and hand the raw bytes
//!   back as an [`EventStream`] for relaying to the caller's client.
//!
//! The timeout bounds the whole exchange in buffered mode. In streaming mode it
//! bounds the wait for response headers and then each gap between chunks.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::signing;
use super::ssrf::WebhookUrlValidator;
use super::types::{RunResult, WebhookError};

/// Used when an app has no timeout of its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

const EVENT_STREAM: &str = "text/event-stream";

/// Client for one partner webhook URL.
///
/// Cheap to clone; clones share the HTTP client.
#[derive(Debug, Clone)]
pub struct WebhookRelayClient {
    url: Url,
    timeout: Duration,
    signing_secret: Option<String>,
    http: reqwest::Client,
}

impl WebhookRelayClient {
    /// Validate `url` and build a client. Nothing is sent for a rejected URL.
    pub fn new(
        url: &str,
        timeout: Duration,
        validator: &WebhookUrlValidator,
    ) -> Result<Self, WebhookError> {
        let url = validator.validate(url)?;
        // Idle connections are not kept, so dropping a response closes its socket.
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        Ok(Self {
            url,
            timeout,
            signing_secret: None,
            http,
        })
    }

    /// Sign every request body with `X-Timestamp` / `X-Signature` headers.
    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `payload` and normalise the partner's JSON reply.
    pub async fn send_buffered(
        &self,
        payload: &Value,
        headers: &[(String, String)],
    ) -> Result<RunResult, WebhookError> {
        let (status, data) = self.exchange(payload, headers).await?;
        RunResult::from_reply(status, &data).inspect_err(|_| {
            warn!(url = %self.url, "Webhook response has no reply");
        })
    }

    /// POST `payload` and return the partner's SSE body for relaying.
    ///
    /// Fails before any bytes are yielded if the partner answers with a
    /// non-200 status or a non-SSE content type.
    pub async fn send_streaming(
        &self,
        payload: &Value,
        headers: &[(String, String)],
    ) -> Result<EventStream, WebhookError> {
        let deadline = Instant::now() + self.timeout;
        let request = self.request(payload, headers, EVENT_STREAM);

        let response = match tokio::time::timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.transport_error(&e)),
            Err(_) => return Err(self.timed_out()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = match tokio::time::timeout_at(deadline, response.bytes()).await {
                Ok(Ok(body)) => String::from_utf8_lossy(&body).into_owned(),
                _ => String::new(),
            };
            warn!(url = %self.url, status = status.as_u16(), "Webhook stream returned error status");
            return Err(WebhookError::bad_status(status.as_u16(), &body));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.to_ascii_lowercase().contains(EVENT_STREAM) {
            warn!(url = %self.url, content_type = %content_type, "Webhook did not return an event stream");
            return Err(WebhookError::BadContentType(content_type));
        }

        debug!(url = %self.url, "Webhook stream opened");
        Ok(EventStream::new(response, self.timeout))
    }

    /// POST `payload` within the timeout and parse a `200` JSON body.
    pub(crate) async fn exchange(
        &self,
        payload: &Value,
        headers: &[(String, String)],
    ) -> Result<(u16, Value), WebhookError> {
        let deadline = Instant::now() + self.timeout;
        let request = self.request(payload, headers, "application/json");

        let call = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout_at(deadline, call).await {
            Ok(Ok(exchange)) => exchange,
            Ok(Err(e)) => return Err(self.transport_error(&e)),
            Err(_) => return Err(self.timed_out()),
        };

        if status != StatusCode::OK {
            warn!(url = %self.url, status = status.as_u16(), "Webhook returned error status");
            return Err(WebhookError::bad_status(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }

        let data: Value = serde_json::from_slice(&body).map_err(|e| {
            warn!(url = %self.url, error = %e, "Webhook returned invalid JSON");
            WebhookError::InvalidJson(e.to_string())
        })?;

        debug!(url = %self.url, status = status.as_u16(), "Webhook replied");
        Ok((status.as_u16(), data))
    }

    fn request(
        &self,
        payload: &Value,
        headers: &[(String, String)],
        accept: &str,
    ) -> reqwest::RequestBuilder {
        // Serialised once so the signature covers the exact bytes sent.
        let body = payload.to_string().into_bytes();

        let mut request = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, accept);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(secret) = &self.signing_secret {
            for (name, value) in signing::signature_headers(secret, &body) {
                request = request.header(name, value);
            }
        }
        request.body(body)
    }

    fn timed_out(&self) -> WebhookError {
        warn!(url = %self.url, timeout = ?self.timeout, "Webhook timed out");
        WebhookError::Timeout(self.timeout)
    }

    fn transport_error(&self, e: &reqwest::Error) -> WebhookError {
        if e.is_timeout() {
            return self.timed_out();
        }
        warn!(url = %self.url, error = %e, "Webhook request failed");
        WebhookError::Transport(e.to_string())
    }
}

// ============================================================================
// Event stream
// ============================================================================

/// Raw SSE bytes from a partner, yielded as they arrive.
///
/// Dropping the stream closes the upstream connection. A gap longer than the
/// client timeout ends the stream with [`WebhookError::Timeout`].
pub struct EventStream {
    inner: BoxStream<'static, Result<Bytes, WebhookError>>,
}

impl EventStream {
    fn new(response: reqwest::Response, idle_timeout: Duration) -> Self {
        let inner = stream::unfold(Some(response), move |state| async move {
            let mut response = state?;
            let next = tokio::time::timeout(idle_timeout, response.chunk()).await;
            match next {
                Ok(Ok(Some(chunk))) => Some((Ok(chunk), Some(response))),
                Ok(Ok(None)) => None,
                Ok(Err(e)) => {
                    warn!(url = %response.url(), error = %e, "Webhook stream failed");
                    Some((Err(WebhookError::Transport(e.to_string())), None))
                }
                Err(_) => {
                    warn!(url = %response.url(), "Webhook stream went idle");
                    Some((Err(WebhookError::Timeout(idle_timeout)), None))
                }
            }
        })
        .boxed();

        Self { inner }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, WebhookError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl IntoResponse for EventStream {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, EVENT_STREAM),
                (header::CACHE_CONTROL, "no-cache"),
                (HeaderName::from_static("x-accel-buffering"), "no"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}
