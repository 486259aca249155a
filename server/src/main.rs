//! Webhook Probe - Command Line Entry Point
//!
//! Sends a sample `message_received` event to a partner webhook and prints the
//! outcome, using the same validation and relay path as the server.

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use hd_server::config::Config;
use hd_server::webhooks::{self, MessageReceivedEvent, ProbeOptions, WebhookRelayClient};

#[derive(Debug, Parser)]
#[command(name = "hd-webhook-probe", version, about)]
struct Args {
    /// Partner webhook URL.
    url: String,

    /// Text of the sample message.
    #[arg(short, long, default_value = "Hello! This is a test message.")]
    message: String,

    /// Expect a server-sent event stream and print frames as they arrive.
    #[arg(long)]
    stream: bool,

    /// Override WEBHOOK_TIMEOUT_MS.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hd_server=info,hd_webhook_probe=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let timeout = args
        .timeout_ms
        .map_or_else(|| config.webhook_timeout(), Duration::from_millis);
    let validator = config.url_validator();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        url = %args.url,
        stream = args.stream,
        "Probing webhook"
    );

    if args.stream {
        return stream_probe(&config, &args, timeout).await;
    }

    let options = ProbeOptions {
        sample_message: &args.message,
        timeout,
        signing_secret: config.webhook_signing_secret.as_deref(),
        header_names: config.partner_header_names(),
    };
    let result = webhooks::probe(&validator, &args.url, &options).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.ok {
        bail!("webhook probe failed");
    }
    Ok(())
}

async fn stream_probe(config: &Config, args: &Args, timeout: Duration) -> Result<()> {
    let mut client = WebhookRelayClient::new(&args.url, timeout, &config.url_validator())?;
    if let Some(secret) = &config.webhook_signing_secret {
        client = client.with_signing_secret(secret.clone());
    }

    let event = MessageReceivedEvent::sample(&args.message);
    let headers = config.partner_header_names().for_event(&event);
    let mut events = client.send_streaming(&event.to_payload()?, &headers).await?;

    let mut stdout = tokio::io::stdout();
    while let Some(chunk) = events.next().await {
        stdout.write_all(&chunk?).await?;
        stdout.flush().await?;
    }
    Ok(())
}
