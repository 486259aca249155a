//! Webhook Types
//!
//! Relay results and the closed set of relay failures.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Source tag on replies produced by a partner webhook.
pub const WEBHOOK_SOURCE: &str = "webhook";

/// Longest slice of a partner error body kept in [`WebhookError::BadStatus`].
pub const MAX_ERROR_BODY_CHARS: usize = 200;

// ============================================================================
// Results
// ============================================================================

/// Normalised outcome of a buffered webhook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RunResult {
    pub reply_text: String,
    pub source: String,
    /// `status_code`, plus `webhook_metadata` when the partner sent `metadata`.
    #[schema(value_type = Object)]
    pub metadata: Value,
    /// Set for asynchronous replies that have not arrived yet.
    pub pending: bool,
}

impl RunResult {
    /// Build from a partner's `200` JSON body.
    ///
    /// `reply` is required; non-string replies are rendered as JSON text.
    pub fn from_reply(status: u16, data: &Value) -> Result<Self, WebhookError> {
        let reply_text = match data.get("reply") {
            None | Some(Value::Null) => return Err(WebhookError::MissingReply),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("status_code".into(), status.into());
        if let Some(partner) = data.get("metadata") {
            metadata.insert("webhook_metadata".into(), partner.clone());
        }

        Ok(Self {
            reply_text,
            source: WEBHOOK_SOURCE.into(),
            metadata: Value::Object(metadata),
            pending: false,
        })
    }
}

/// Outcome of a webhook probe ("send a test event").
///
/// Failures are reported in-band so the caller can show them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WebhookTestResult {
    pub ok: bool,
    pub status_code: Option<u16>,
    #[schema(value_type = Option<Object>)]
    pub response_json: Option<Value>,
    pub error: Option<String>,
    pub latency_ms: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Why a webhook URL was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlRejection {
    #[error("webhook URL is empty")]
    Empty,
    #[error("webhook URL is malformed: {0}")]
    Malformed(String),
    #[error("webhook URL scheme '{0}' is not allowed, use http or https")]
    BadScheme(String),
    #[error("webhook URL has no host")]
    NoHost,
    #[error("webhook host '{0}' is blocked")]
    Blocked(String),
    #[error("webhook host '{0}' is blocked: private network address")]
    BlockedPrivate(String),
}

/// Failure kinds of the relay, without their details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookErrorKind {
    InvalidUrl,
    Timeout,
    BadStatus,
    InvalidJson,
    MissingReply,
    BadContentType,
    Transport,
}

impl WebhookErrorKind {
    /// Stable symbolic code for API clients.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "ERROR_WEBHOOK_URL_INVALID",
            Self::Timeout => "ERROR_WEBHOOK_TIMEOUT",
            Self::BadStatus => "ERROR_WEBHOOK_BAD_STATUS",
            Self::InvalidJson => "ERROR_WEBHOOK_INVALID_JSON",
            Self::MissingReply => "ERROR_WEBHOOK_MISSING_REPLY",
            Self::BadContentType => "ERROR_WEBHOOK_BAD_CONTENT_TYPE",
            Self::Transport => "ERROR_WEBHOOK_REQUEST_FAILED",
        }
    }
}

impl std::fmt::Display for WebhookErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed webhook call. Every call ends in exactly one of these or a result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlRejection),
    #[error("webhook timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("webhook returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("webhook returned invalid JSON: {0}")]
    InvalidJson(String),
    #[error("webhook response is missing the 'reply' field")]
    MissingReply,
    #[error("webhook did not return an event stream (content type '{0}')")]
    BadContentType(String),
    #[error("webhook request failed: {0}")]
    Transport(String),
}

impl WebhookError {
    pub const fn kind(&self) -> WebhookErrorKind {
        match self {
            Self::InvalidUrl(_) => WebhookErrorKind::InvalidUrl,
            Self::Timeout(_) => WebhookErrorKind::Timeout,
            Self::BadStatus { .. } => WebhookErrorKind::BadStatus,
            Self::InvalidJson(_) => WebhookErrorKind::InvalidJson,
            Self::MissingReply => WebhookErrorKind::MissingReply,
            Self::BadContentType(_) => WebhookErrorKind::BadContentType,
            Self::Transport(_) => WebhookErrorKind::Transport,
        }
    }

    pub const fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// `BadStatus` with the body cut to [`MAX_ERROR_BODY_CHARS`] characters.
    pub(crate) fn bad_status(status: u16, body: &str) -> Self {
        Self::BadStatus {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            WebhookErrorKind::InvalidUrl => StatusCode::BAD_REQUEST,
            WebhookErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
