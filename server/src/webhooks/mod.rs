//! Partner Webhook Relay
//!
//! Forwards subscriber messages to an app's webhook and relays the reply,
//! buffered or as a server-sent event stream. Webhook URLs are screened
//! against SSRF before any request is made.

pub mod client;
pub mod events;
pub mod probe;
pub mod signing;
pub mod ssrf;
pub mod types;

pub use client::{EventStream, WebhookRelayClient, DEFAULT_TIMEOUT};
pub use events::{MessageReceivedEvent, PartnerHeaderNames};
pub use probe::{probe, ProbeOptions};
pub use ssrf::WebhookUrlValidator;
pub use types::{RunResult, UrlRejection, WebhookError, WebhookErrorKind, WebhookTestResult};
