//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::webhooks::{PartnerHeaderNames, WebhookUrlValidator};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this backend (e.g., "<https://api.example.com>")
    pub backend_url: String,

    /// Webhook timeout in milliseconds (default: 8000)
    pub webhook_timeout_ms: u64,

    /// Header carrying the app id on partner webhook calls
    pub webhook_header_app_id: String,

    /// Header carrying the thread id on partner webhook calls
    pub webhook_header_thread_id: String,

    /// Secret for signing webhook bodies (unsigned when absent)
    pub webhook_signing_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000".into());
        reqwest::Url::parse(&backend_url)
            .with_context(|| format!("BACKEND_URL must be a valid URL, got {backend_url:?}"))?;

        Ok(Self {
            backend_url,
            webhook_timeout_ms: env::var("WEBHOOK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(8000),
            webhook_header_app_id: env::var("WEBHOOK_HEADER_APP_ID")
                .unwrap_or_else(|_| "X-App-Id".into()),
            webhook_header_thread_id: env::var("WEBHOOK_HEADER_THREAD_ID")
                .unwrap_or_else(|_| "X-Thread-Id".into()),
            webhook_signing_secret: env::var("WEBHOOK_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }

    #[must_use]
    pub const fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }

    /// Validator that lets the backend call its own host.
    #[must_use]
    pub fn url_validator(&self) -> WebhookUrlValidator {
        WebhookUrlValidator::from_backend_url(&self.backend_url)
    }

    #[must_use]
    pub fn partner_header_names(&self) -> PartnerHeaderNames {
        PartnerHeaderNames {
            app_id: self.webhook_header_app_id.clone(),
            thread_id: self.webhook_header_thread_id.clone(),
        }
    }

    /// Create a default configuration for testing.
    ///
    /// The backend is `127.0.0.1`, so webhooks served by local test servers
    /// pass URL validation.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            webhook_timeout_ms: 2000,
            webhook_header_app_id: "X-App-Id".into(),
            webhook_header_thread_id: "X-Thread-Id".into(),
            webhook_signing_secret: None,
        }
    }
}
