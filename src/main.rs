//! pullsub demo — publishes a few messages on a channel and reads them back
//! through a pull stream, stopping at `"done"`.

use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{EnvFilter, fmt};

use pullsub_core::config::AppConfig;
use pullsub_core::error::AppError;
use pullsub_core::identity::load_or_create_user_id;
use pullsub_realtime::client::create_bridge_with;
use pullsub_realtime::{MessageStream, SubscriptionHandle};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "pullsub-demo", version, about = "Pull-based pub/sub demo")]
struct Args {
    /// Configuration overlay to load from `config/{env}.toml`.
    #[arg(long, env = "PULLSUB_ENV", default_value = "development")]
    env: String,
    /// Override the demo channel.
    #[arg(long)]
    channel: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(channel) = args.channel {
        config.demo.channel = channel;
    }

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(mut config: AppConfig) -> Result<(), AppError> {
    if config.transport.user_id.is_none() {
        config.transport.user_id = Some(load_or_create_user_id(&config.identity.path).await?);
    }

    let bridge = create_bridge_with(&config.transport, &config.bridge)?;

    tracing::info!("Connecting to '{}'...", config.demo.channel);
    let stream = bridge.subscribe(&config.demo.channel).await?.into_stream();

    tracing::info!("Starting publish loop...");
    let publisher = tokio::spawn(publish_loop(
        stream.handle(),
        config.demo.messages.clone(),
        Duration::from_millis(config.demo.interval_ms),
    ));

    tracing::info!("Starting subscribe loop...");
    subscribe_loop(stream).await?;

    publisher
        .await
        .map_err(|e| AppError::internal(format!("Publish loop panicked: {e}")))??;

    let metrics = bridge.metrics();
    tracing::info!(
        delivered = metrics.messages_delivered,
        dropped = metrics.messages_dropped,
        "Done!"
    );
    Ok(())
}

/// Print every message until `"done"` arrives. Leaving the loop drops the
/// stream, which closes the subscription.
async fn subscribe_loop(mut stream: MessageStream) -> Result<(), AppError> {
    while let Some(event) = stream.next().await {
        let event = event?;
        println!("Received: {}", event.message);

        if event.message == serde_json::json!("done") {
            break;
        }
    }
    Ok(())
}

async fn publish_loop(
    handle: std::sync::Arc<SubscriptionHandle>,
    messages: Vec<serde_json::Value>,
    interval: Duration,
) -> Result<(), AppError> {
    for message in messages {
        tokio::time::sleep(interval).await;
        println!("Sending: {}", message);
        handle.publish(&message).await?;
    }
    Ok(())
}
