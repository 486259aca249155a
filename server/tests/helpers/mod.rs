//! Reusable helpers for webhook relay integration tests.
//!
//! Partner webhooks are stood up as real axum servers on random local ports.
//! The test backend lives on `127.0.0.1`, so those URLs pass validation
//! through the backend self-call exception.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use bytes::Bytes;
use futures::stream::{self, Stream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use hd_server::config::Config;
use hd_server::webhooks::{WebhookRelayClient, WebhookUrlValidator};

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    _handle: JoinHandle<()>,
}

impl TestServer {
    pub fn hook_url(&self) -> String {
        format!("{}/hook", self.url)
    }
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        _handle: handle,
    }
}

/// URL of a local port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe port");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}/hook")
}

// ============================================================================
// Relay helpers
// ============================================================================

pub fn test_validator() -> WebhookUrlValidator {
    Config::default_for_test().url_validator()
}

pub fn relay_client(url: &str, timeout: Duration) -> WebhookRelayClient {
    WebhookRelayClient::new(url, timeout, &test_validator()).expect("test URL should validate")
}

// ============================================================================
// Drop detection
// ============================================================================

/// Fires its receiver when dropped.
pub struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

pub fn drop_signal() -> (DropSignal, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    (DropSignal(Some(tx)), rx)
}

/// Endless SSE frames every `interval`, holding `guard` until the body is dropped.
pub fn endless_frames(
    guard: DropSignal,
    interval: Duration,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    stream::unfold((guard, 0u32), move |(guard, n)| async move {
        tokio::time::sleep(interval).await;
        let frame = Bytes::from(format!("data: {{\"delta\":\"chunk {n}\"}}\n\n"));
        Some((Ok(frame), (guard, n + 1)))
    })
}

/// Wait until a [`DropSignal`] fires, or fail after a few seconds.
pub async fn assert_dropped(rx: oneshot::Receiver<()>, what: &str) {
    tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap_or_else(|_| panic!("{what} was not released"))
        .expect("drop signal sender vanished");
}
