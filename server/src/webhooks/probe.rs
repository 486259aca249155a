//! Webhook Probe
//!
//! Sends a sample `message_received` event so an app owner can check their
//! webhook before going live.

use std::time::{Duration, Instant};

use tracing::info;

use super::client::WebhookRelayClient;
use super::events::{MessageReceivedEvent, PartnerHeaderNames};
use super::ssrf::WebhookUrlValidator;
use super::types::{RunResult, WebhookError, WebhookTestResult};

/// Probe settings beyond the URL itself.
#[derive(Debug, Clone)]
pub struct ProbeOptions<'a> {
    pub sample_message: &'a str,
    pub timeout: Duration,
    pub signing_secret: Option<&'a str>,
    /// Names of the app and thread id headers sent with the sample event.
    pub header_names: PartnerHeaderNames,
}

/// Call `url` with a sample event and report what happened.
///
/// Never fails: every problem, including a rejected URL, is reported in the
/// result's `error`.
pub async fn probe(
    validator: &WebhookUrlValidator,
    url: &str,
    options: &ProbeOptions<'_>,
) -> WebhookTestResult {
    let started = Instant::now();
    let result = run_probe(validator, url, options).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let outcome = match result {
        Ok((status, data)) => match RunResult::from_reply(status, &data) {
            Ok(_) => WebhookTestResult {
                ok: true,
                status_code: Some(status),
                response_json: Some(data),
                error: None,
                latency_ms,
            },
            Err(e) => WebhookTestResult {
                ok: false,
                status_code: Some(status),
                response_json: Some(data),
                error: Some(e.to_string()),
                latency_ms,
            },
        },
        Err(e) => WebhookTestResult {
            ok: false,
            status_code: match &e {
                WebhookError::BadStatus { status, .. } => Some(*status),
                _ => None,
            },
            response_json: None,
            error: Some(e.to_string()),
            latency_ms,
        },
    };

    info!(
        url = %url,
        ok = outcome.ok,
        status_code = ?outcome.status_code,
        latency_ms,
        "Webhook probe finished"
    );
    outcome
}

async fn run_probe(
    validator: &WebhookUrlValidator,
    url: &str,
    options: &ProbeOptions<'_>,
) -> Result<(u16, serde_json::Value), WebhookError> {
    let mut client = WebhookRelayClient::new(url, options.timeout, validator)?;
    if let Some(secret) = options.signing_secret {
        client = client.with_signing_secret(secret);
    }

    let event = MessageReceivedEvent::sample(options.sample_message);
    let headers = options.header_names.for_event(&event);
    let payload = event
        .to_payload()
        .map_err(|e| WebhookError::Transport(format!("failed to build sample event: {e}")))?;

    client.exchange(&payload, &headers).await
}
