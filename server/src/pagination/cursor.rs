//! Opaque Cursor Codec
//!
//! Encodes the ordering tuple of the last row on a page into a URL-safe token
//! and decodes it back against a caller-supplied schema.
//!
//! Token layout: `base64url({"field": canonical_value, ...})`. Timestamps are
//! RFC 3339 with an explicit offset, UUIDs are lowercase hyphenated, integers
//! and booleans stay JSON scalars.

use std::cmp::Ordering;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::error::CursorError;

/// URL-safe alphabet. Emits padding, accepts tokens with or without it.
const CURSOR_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// Values & Schema
// ============================================================================

/// A single scalar in a cursor payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CursorValue {
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl CursorValue {
    /// The parser that accepts this value's canonical form.
    pub const fn kind(&self) -> CursorKind {
        match self {
            Self::Timestamp(_) => CursorKind::Timestamp,
            Self::Uuid(_) => CursorKind::Uuid,
            Self::Text(_) => CursorKind::Text,
            Self::Integer(_) => CursorKind::Integer,
            Self::Boolean(_) => CursorKind::Boolean,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            Self::Uuid(id) => Value::String(id.hyphenated().to_string()),
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }
}

/// Values only compare within the same variant; mixed variants are unordered.
impl PartialOrd for CursorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for CursorValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Uuid> for CursorValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<String> for CursorValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for CursorValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for CursorValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for CursorValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Value parser applied to one decoded cursor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    /// RFC 3339 string with offset, normalised to UTC.
    Timestamp,
    /// UUID string in any case.
    Uuid,
    /// JSON string.
    Text,
    /// JSON integer or a string holding one.
    Integer,
    /// JSON boolean.
    Boolean,
}

impl CursorKind {
    fn parse(self, field: &str, raw: &Value) -> Result<CursorValue, CursorError> {
        let invalid = |reason: String| CursorError::InvalidField {
            field: field.to_owned(),
            reason,
        };

        match self {
            Self::Timestamp => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| invalid("expected an ISO-8601 timestamp string".into()))?;
                DateTime::parse_from_rfc3339(text)
                    .map(|ts| CursorValue::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|e| invalid(e.to_string()))
            }
            Self::Uuid => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| invalid("expected a UUID string".into()))?;
                Uuid::parse_str(text)
                    .map(CursorValue::Uuid)
                    .map_err(|e| invalid(e.to_string()))
            }
            Self::Text => raw
                .as_str()
                .map(|text| CursorValue::Text(text.to_owned()))
                .ok_or_else(|| invalid("expected a string".into())),
            Self::Integer => match raw {
                Value::Number(n) => n
                    .as_i64()
                    .map(CursorValue::Integer)
                    .ok_or_else(|| invalid(format!("{n} is not a 64-bit integer"))),
                Value::String(text) => text
                    .parse::<i64>()
                    .map(CursorValue::Integer)
                    .map_err(|e| invalid(e.to_string())),
                _ => Err(invalid("expected an integer".into())),
            },
            Self::Boolean => raw
                .as_bool()
                .map(CursorValue::Boolean)
                .ok_or_else(|| invalid("expected a boolean".into())),
        }
    }
}

/// Ordered `(field, parser)` pairs used to decode a cursor.
///
/// Field order must match the ordering the cursor is applied to. Prefer
/// [`super::KeysetOrdering::cursor_schema`], which derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSchema {
    fields: Vec<(&'static str, CursorKind)>,
}

impl CursorSchema {
    pub fn new(fields: impl IntoIterator<Item = (&'static str, CursorKind)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    pub fn fields(&self) -> &[(&'static str, CursorKind)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Ordering tuple of the last row on a page, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorPayload {
    entries: Vec<(String, CursorValue)>,
}

impl CursorPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, replacing an earlier value in place.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<CursorValue>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&CursorValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CursorValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Values in field order.
    pub fn into_values(self) -> Vec<CursorValue> {
        self.entries.into_iter().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<CursorValue>> FromIterator<(K, V)> for CursorPayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |payload, (field, value)| payload.with(field, value))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encode a payload as an opaque, URL-safe cursor token.
///
/// Fields are written in payload order, so equal payloads always produce the
/// same token.
pub fn encode_cursor(payload: &CursorPayload) -> String {
    let mut raw = String::from("{");
    for (idx, (field, value)) in payload.iter().enumerate() {
        if idx > 0 {
            raw.push(',');
        }
        raw.push_str(&Value::from(field).to_string());
        raw.push(':');
        raw.push_str(&value.to_json().to_string());
    }
    raw.push('}');
    CURSOR_ENGINE.encode(raw)
}

/// Decode a cursor token and coerce every schema field.
///
/// Fields present in the token but absent from the schema are ignored.
pub fn decode_cursor(token: &str, schema: &CursorSchema) -> Result<CursorPayload, CursorError> {
    let raw = CURSOR_ENGINE
        .decode(token)
        .map_err(|e| CursorError::Encoding(e.to_string()))?;
    let data: Value =
        serde_json::from_slice(&raw).map_err(|e| CursorError::Encoding(e.to_string()))?;
    let Value::Object(map) = data else {
        return Err(CursorError::NotAnObject);
    };

    let mut payload = CursorPayload::new();
    for (field, kind) in schema.fields() {
        let raw = map
            .get(*field)
            .ok_or_else(|| CursorError::MissingField((*field).to_owned()))?;
        payload.entries.push(((*field).to_owned(), kind.parse(field, raw)?));
    }
    Ok(payload)
}
