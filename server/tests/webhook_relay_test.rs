//! Integration Tests for the Partner Webhook Relay
//!
//! Runs the relay client against real local partner servers: buffered replies,
//! streamed replies, every failure kind, signing, and the probe.
//!
//! Run with: `cargo test --test webhook_relay_test -- --nocapture`

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures::StreamExt;
use helpers::{
    assert_dropped, closed_port_url, drop_signal, endless_frames, relay_client, spawn_test_server,
    test_validator,
};
use serde_json::{json, Value};

use hd_server::webhooks::signing::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use hd_server::webhooks::{
    self, MessageReceivedEvent, PartnerHeaderNames, ProbeOptions, UrlRejection, WebhookError,
    WebhookErrorKind, WebhookRelayClient,
};

const TIMEOUT: Duration = Duration::from_secs(2);

fn sample_payload() -> (Value, Vec<(String, String)>) {
    let event = MessageReceivedEvent::sample("Where is my order?");
    let headers = PartnerHeaderNames::default().for_event(&event);
    (event.to_payload().unwrap(), headers)
}

fn sse_response(body: Body) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

// ============================================================================
// Buffered mode
// ============================================================================

#[tokio::test]
async fn buffered_reply_is_normalised() {
    let seen: Arc<Mutex<Vec<(HeaderMap, Value)>>> = Arc::default();
    let captured = seen.clone();
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            async move {
                captured.lock().unwrap().push((headers, body));
                Json(json!({"reply": "Hello from webhook", "metadata": {"intent": "greeting"}}))
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let result = relay_client(&server.hook_url(), TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap();

    assert_eq!(result.reply_text, "Hello from webhook");
    assert_eq!(result.source, "webhook");
    assert!(!result.pending);
    assert_eq!(
        result.metadata,
        json!({"status_code": 200, "webhook_metadata": {"intent": "greeting"}})
    );

    let seen = seen.lock().unwrap();
    let (partner_headers, body) = &seen[0];
    assert_eq!(body, &payload);
    assert_eq!(body["event"], "message_received");
    assert_eq!(partner_headers["x-app-id"], payload["app"]["id"].as_str().unwrap());
    assert_eq!(partner_headers["x-thread-id"], payload["thread"]["id"].as_str().unwrap());
    assert_eq!(partner_headers[header::CONTENT_TYPE], "application/json");
    assert!(partner_headers.get(SIGNATURE_HEADER).is_none());
}

#[tokio::test]
async fn buffered_missing_reply() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { Json(json!({"text": "no reply field"})) }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();
    assert_eq!(err, WebhookError::MissingReply);
}

#[tokio::test]
async fn buffered_invalid_json() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { "definitely not json" }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::InvalidJson);
}

#[tokio::test]
async fn buffered_bad_status_truncates_body() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(500)) }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();
    let WebhookError::BadStatus { status, body } = err else {
        panic!("expected bad status");
    };
    assert_eq!(status, 500);
    assert_eq!(body, "x".repeat(200));
}

#[tokio::test]
async fn buffered_non_200_success_is_bad_status() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { (StatusCode::CREATED, Json(json!({"reply": "created"}))) }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::BadStatus { status: 201, .. }));
}

#[tokio::test]
async fn buffered_slow_partner_times_out() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"reply": "too late"}))
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let started = Instant::now();
    let err = relay_client(&server.hook_url(), Duration::from_millis(200))
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();

    assert_eq!(err, WebhookError::Timeout(Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn buffered_connection_refused_is_transport() {
    let (payload, headers) = sample_payload();
    let err = relay_client(&closed_port_url().await, TIMEOUT)
        .send_buffered(&payload, &headers)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::Transport);
}

#[tokio::test]
async fn blocked_url_is_rejected_before_sending() {
    let err = WebhookRelayClient::new("http://localhost:9/hook", TIMEOUT, &test_validator())
        .unwrap_err();
    assert_eq!(
        err,
        WebhookError::InvalidUrl(UrlRejection::Blocked("localhost".into()))
    );

    let err = WebhookRelayClient::new("https://192.168.0.10/hook", TIMEOUT, &test_validator())
        .unwrap_err();
    assert_eq!(err.kind(), WebhookErrorKind::InvalidUrl);
}

#[tokio::test]
async fn signed_requests_verify_against_raw_body() {
    let seen: Arc<Mutex<Option<(HeaderMap, Bytes)>>> = Arc::default();
    let captured = seen.clone();
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, body: Bytes| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = Some((headers, body));
                Json(json!({"reply": "ok"}))
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    relay_client(&server.hook_url(), TIMEOUT)
        .with_signing_secret("whsec_test")
        .send_buffered(&payload, &headers)
        .await
        .unwrap();

    let (headers, body) = seen.lock().unwrap().take().unwrap();
    let timestamp: i64 = headers[TIMESTAMP_HEADER].to_str().unwrap().parse().unwrap();
    let signature = headers[SIGNATURE_HEADER].to_str().unwrap();
    assert!(verify_signature("whsec_test", timestamp, &body, signature));
    assert!(!verify_signature("other_secret", timestamp, &body, signature));
}

// ============================================================================
// Streaming mode
// ============================================================================

#[tokio::test]
async fn streaming_relays_frames_in_order() {
    let frames = [
        "data: {\"delta\":\"Hel\"}\n\n",
        "data: {\"delta\":\"lo\"}\n\n",
        "data: [DONE]\n\n",
    ];
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move || async move {
            let body = futures::stream::iter(frames).then(|frame| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, std::io::Error>(Bytes::from(frame))
            });
            sse_response(Body::from_stream(body))
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let stream = relay_client(&server.hook_url(), TIMEOUT)
        .send_streaming(&payload, &headers)
        .await
        .unwrap();

    let chunks: Vec<Bytes> = stream.map(Result::unwrap).collect().await;
    let relayed: Vec<u8> = chunks.concat();
    assert_eq!(String::from_utf8(relayed).unwrap(), frames.concat());
}

#[tokio::test]
async fn streaming_rejects_wrong_content_type_and_closes() {
    let (guard, released) = drop_signal();
    let guard = Arc::new(Mutex::new(Some(guard)));
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move || {
            let guard = guard.lock().unwrap().take().unwrap();
            async move {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    Body::from_stream(endless_frames(guard, Duration::from_millis(50))),
                )
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_streaming(&payload, &headers)
        .await
        .unwrap_err();

    assert_eq!(err, WebhookError::BadContentType("application/json".into()));
    assert_dropped(released, "partner stream").await;
}

#[tokio::test]
async fn streaming_bad_status() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "partner down") }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let err = relay_client(&server.hook_url(), TIMEOUT)
        .send_streaming(&payload, &headers)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WebhookError::BadStatus {
            status: 503,
            body: "partner down".into()
        }
    );
}

#[tokio::test]
async fn dropping_stream_closes_upstream() {
    let (guard, released) = drop_signal();
    let guard = Arc::new(Mutex::new(Some(guard)));
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move || {
            let guard = guard.lock().unwrap().take().unwrap();
            async move {
                sse_response(Body::from_stream(endless_frames(
                    guard,
                    Duration::from_millis(50),
                )))
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let mut stream = relay_client(&server.hook_url(), TIMEOUT)
        .send_streaming(&payload, &headers)
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"data: "));
    drop(stream);

    assert_dropped(released, "partner stream").await;
}

#[tokio::test]
async fn streaming_idle_gap_times_out() {
    let (guard, released) = drop_signal();
    let guard = Arc::new(Mutex::new(Some(guard)));
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move || {
            let guard = guard.lock().unwrap().take().unwrap();
            async move {
                let body = futures::stream::once(async {
                    Ok::<_, std::io::Error>(Bytes::from_static(b"data: first\n\n"))
                })
                .chain(futures::stream::once(async move {
                    let _guard = guard;
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Ok(Bytes::from_static(b"data: too late\n\n"))
                }));
                sse_response(Body::from_stream(body))
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let mut stream = relay_client(&server.hook_url(), Duration::from_millis(300))
        .send_streaming(&payload, &headers)
        .await
        .unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap(), "data: first\n\n");
    assert_eq!(
        stream.next().await.unwrap(),
        Err(WebhookError::Timeout(Duration::from_millis(300)))
    );

    // The partner body is released on timeout, while the stream is still held.
    assert_dropped(released, "stalled partner stream").await;
    assert!(stream.next().await.is_none());
    drop(stream);
}

#[tokio::test]
async fn finished_stream_releases_upstream() {
    let (guard, released) = drop_signal();
    let guard = Arc::new(Mutex::new(Some(guard)));
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move || {
            let guard = guard.lock().unwrap().take().unwrap();
            async move {
                let frames = ["data: {\"delta\":\"done\"}\n\n", "data: [DONE]\n\n"];
                let body = futures::stream::iter(frames).map(move |frame| {
                    let _held = &guard;
                    Ok::<_, std::io::Error>(Bytes::from_static(frame.as_bytes()))
                });
                sse_response(Body::from_stream(body))
            }
        }),
    ))
    .await;

    let (payload, headers) = sample_payload();
    let mut stream = relay_client(&server.hook_url(), TIMEOUT)
        .send_streaming(&payload, &headers)
        .await
        .unwrap();

    let mut relayed = Vec::new();
    while let Some(chunk) = stream.next().await {
        relayed.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(relayed, b"data: {\"delta\":\"done\"}\n\ndata: [DONE]\n\n");

    assert_dropped(released, "finished partner stream").await;
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn event_stream_relays_through_axum_response() {
    let partner = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async {
            sse_response(Body::from("data: {\"delta\":\"hi\"}\n\ndata: [DONE]\n\n"))
        }),
    ))
    .await;

    let partner_url = partner.hook_url();
    let relay = spawn_test_server(Router::new().route(
        "/relay",
        post(move || {
            let partner_url = partner_url.clone();
            async move {
                let (payload, headers) = sample_payload();
                relay_client(&partner_url, TIMEOUT)
                    .send_streaming(&payload, &headers)
                    .await
                    .map(IntoResponse::into_response)
                    .unwrap_or_else(IntoResponse::into_response)
            }
        }),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("{}/relay", relay.url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["content-type"], "text/event-stream");
    assert_eq!(resp.headers()["cache-control"], "no-cache");
    assert_eq!(
        resp.text().await.unwrap(),
        "data: {\"delta\":\"hi\"}\n\ndata: [DONE]\n\n"
    );
}

// ============================================================================
// Probe
// ============================================================================

fn probe_options(message: &str) -> ProbeOptions<'_> {
    ProbeOptions {
        sample_message: message,
        timeout: TIMEOUT,
        signing_secret: None,
        header_names: PartnerHeaderNames::default(),
    }
}

#[tokio::test]
async fn probe_reports_success() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|Json(body): Json<Value>| async move {
            Json(json!({"reply": format!("You said: {}", body["message"]["content"].as_str().unwrap())}))
        }),
    ))
    .await;

    let result =
        webhooks::probe(&test_validator(), &server.hook_url(), &probe_options("ping")).await;
    assert!(result.ok, "probe failed: {:?}", result.error);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.response_json, Some(json!({"reply": "You said: ping"})));
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn probe_reports_missing_reply() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { Json(json!({"text": "no reply field"})) }),
    ))
    .await;

    let result =
        webhooks::probe(&test_validator(), &server.hook_url(), &probe_options("ping")).await;
    assert!(!result.ok);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.response_json, Some(json!({"text": "no reply field"})));
    assert!(result.error.unwrap().contains("reply"));
}

#[tokio::test]
async fn probe_reports_bad_status() {
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;

    let result =
        webhooks::probe(&test_validator(), &server.hook_url(), &probe_options("ping")).await;
    assert!(!result.ok);
    assert_eq!(result.status_code, Some(500));
    assert_eq!(result.response_json, None);
    assert!(result.error.unwrap().contains("boom"));
}

#[tokio::test]
async fn probe_reports_rejected_urls_in_band() {
    let result =
        webhooks::probe(&test_validator(), "http://localhost/hook", &probe_options("ping")).await;
    assert!(!result.ok);
    assert_eq!(result.status_code, None);
    assert!(result.error.unwrap().contains("blocked"));

    let result =
        webhooks::probe(&test_validator(), "ftp://example.com/hook", &probe_options("ping")).await;
    assert!(!result.ok);
    assert!(result.error.unwrap().contains("scheme"));
}

#[tokio::test]
async fn probe_sends_partner_headers() {
    let seen: Arc<Mutex<Option<(HeaderMap, Value)>>> = Arc::default();
    let captured = seen.clone();
    let server = spawn_test_server(Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = Some((headers, body));
                Json(json!({"reply": "routed"}))
            }
        }),
    ))
    .await;

    let options = ProbeOptions {
        header_names: PartnerHeaderNames {
            app_id: "X-Partner-App".into(),
            thread_id: "X-Partner-Thread".into(),
        },
        ..probe_options("ping")
    };
    let result = webhooks::probe(&test_validator(), &server.hook_url(), &options).await;
    assert!(result.ok, "probe failed: {:?}", result.error);

    let (headers, body) = seen.lock().unwrap().take().unwrap();
    assert_eq!(headers["x-partner-app"], body["app"]["id"].as_str().unwrap());
    assert_eq!(headers["x-partner-thread"], body["thread"]["id"].as_str().unwrap());
}
