//! Partner Webhook Events
//!
//! The `message_received` contract POSTed to a partner's webhook, and the
//! identifying headers sent alongside it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Contract version sent in every event.
pub const EVENT_VERSION: &str = "1.0";

/// Webhook event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// A subscriber sent a message in a thread.
    MessageReceived,
}

impl WebhookEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventApp {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventThread {
    pub id: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub seq: i64,
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "empty_object")]
    pub content_json: Value,
}

/// Earlier message in the thread, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "empty_object")]
    pub content_json: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Body of a `message_received` webhook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReceivedEvent {
    pub version: String,
    pub event: WebhookEventType,
    pub app: EventApp,
    pub thread: EventThread,
    pub message: EventMessage,
    pub history_tail: Vec<HistoryEntry>,
    #[serde(with = "contract_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl MessageReceivedEvent {
    pub fn new(
        app: EventApp,
        thread: EventThread,
        message: EventMessage,
        history_tail: Vec<HistoryEntry>,
    ) -> Self {
        Self {
            version: EVENT_VERSION.into(),
            event: WebhookEventType::MessageReceived,
            app,
            thread,
            message,
            history_tail,
            timestamp: Utc::now(),
        }
    }

    /// Placeholder event used to probe a webhook before it goes live.
    pub fn sample(content: &str) -> Self {
        Self::new(
            EventApp {
                id: uuid::Uuid::now_v7().to_string(),
                name: "Webhook test".into(),
            },
            EventThread {
                id: uuid::Uuid::now_v7().to_string(),
                customer_id: Some("test-customer".into()),
            },
            EventMessage {
                id: uuid::Uuid::now_v7().to_string(),
                seq: 1,
                role: MessageRole::User,
                content: content.into(),
                content_json: empty_object(),
            },
            Vec::new(),
        )
    }

    pub fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// `2026-02-15T12:00:00Z`: whole seconds, `Z` suffix.
mod contract_timestamp {
    use super::{DateTime, Deserialize, Deserializer, SecondsFormat, Serializer, Utc};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Names of the identifying headers sent to partners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerHeaderNames {
    pub app_id: String,
    pub thread_id: String,
}

impl Default for PartnerHeaderNames {
    fn default() -> Self {
        Self {
            app_id: "X-App-Id".into(),
            thread_id: "X-Thread-Id".into(),
        }
    }
}

impl PartnerHeaderNames {
    /// Header pairs identifying the app and thread of an event.
    pub fn for_event(&self, event: &MessageReceivedEvent) -> Vec<(String, String)> {
        vec![
            (self.app_id.clone(), event.app.id.clone()),
            (self.thread_id.clone(), event.thread.id.clone()),
        ]
    }
}
