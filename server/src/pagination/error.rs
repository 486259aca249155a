//! Pagination error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// A client-supplied cursor could not be decoded.
///
/// Every variant is the same caller-visible condition (`ERROR_INVALID_CURSOR`);
/// the variant only sharpens the detail message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor is not valid base64url-encoded JSON: {0}")]
    Encoding(String),
    #[error("cursor does not decode to an object")]
    NotAnObject,
    #[error("cursor is missing field '{0}'")]
    MissingField(String),
    #[error("cursor field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

impl CursorError {
    pub const CODE: &'static str = "ERROR_INVALID_CURSOR";

    /// Stable symbolic code for API clients.
    pub const fn code(&self) -> &'static str {
        Self::CODE
    }
}

impl IntoResponse for CursorError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": self.code(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Misuse of the keyset builder. These are programming errors, not bad input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeysetError {
    #[error("keyset needs at least one column")]
    Empty,
    #[error("columns and values must align for pagination ({columns} columns, {values} values)")]
    LengthMismatch { columns: usize, values: usize },
    #[error("cursor schema does not match ordering at position {position}")]
    SchemaMismatch { position: usize },
}
