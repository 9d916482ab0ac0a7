//! Stream Notifier - filtered live stream listener
//!
//! This service holds a connection to a filtered streaming endpoint, picks
//! notable events out of the newline-delimited JSON it receives, and turns
//! them into feedback cues. It reconnects forever with category-specific
//! backoff.
//!
//! ## Features
//!
//! - Fixed-memory incremental framing of the stream
//! - Non-blocking feedback queue that drops on overflow
//! - Reconnect backoff per failure category (network, HTTP error, rate limit)
//! - Graceful shutdown on SIGINT
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables; see
//! [`stream_notifier::config::Config`]. `RUST_LOG` sets the logging filter
//! (default: `info,hyper=warn`).

use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use stream_notifier::config::Config;
use stream_notifier::ingest::IngestionLoop;
use stream_notifier::session::StreamClient;
use stream_notifier::sink::{feedback_task, ChannelSink, Cue, Feedback};
use stream_notifier::transport::{HttpTransport, StaticSigner};

/// Default logging filter; the HTTP stack is chatty at debug
const DEFAULT_LOG_FILTER: &str = "info,hyper=warn";

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting Stream Notifier...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                stream_url = %config.stream_url,
                buffer_capacity = config.buffer_capacity,
                read_chunk_size = config.read_chunk_size,
                stall_timeout_secs = config.stall_timeout.as_secs(),
                rate_limit_cap_ms = ?config.rate_limit_cap_ms,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let transport = match HttpTransport::new(&config) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Failed to create HTTP transport");
            std::process::exit(1);
        }
    };

    let client = StreamClient::from_config(transport, StaticSigner::from_config(&config), &config);
    let (sink, feedback_rx) = ChannelSink::new(config.event_queue_capacity);

    // Spawn feedback task - turns notifications into cues
    let feedback_handle = tokio::spawn(async move {
        info!("Feedback task started");
        feedback_task(feedback_rx, play_cue).await;
        info!("Feedback task completed");
    });

    // Spawn ingestion task - reconnects forever
    let ingestion = IngestionLoop::from_config(client, sink, &config);
    let ingestion_handle = tokio::spawn(async move {
        info!("Ingestion task started");
        ingestion.run().await;
    });

    info!("Stream Notifier running. Press Ctrl+C to stop.");
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping...");
        }
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    }

    // Aborting ingestion drops the sink, which closes the feedback channel
    ingestion_handle.abort();
    let _ = ingestion_handle.await;

    let shutdown_timeout = Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, feedback_handle).await {
        Ok(Ok(())) => {
            info!("Feedback task shut down gracefully");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Feedback task panicked during shutdown");
        }
        Err(_) => {
            warn!("Feedback task shutdown timed out after {:?}", shutdown_timeout);
        }
    }

    info!("Stream Notifier stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Produce a cue. The audio driver lives outside this binary, so cues are
/// logged.
fn play_cue(cue: Cue, feedback: &Feedback) {
    match feedback {
        Feedback::Event(event) => {
            info!(cue = %cue, text = event.text().unwrap_or_default(), "Playing cue");
            match serde_json::to_string(event) {
                Ok(json) => debug!(event = %json, "Event record"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            }
        }
        Feedback::Failure(category) => {
            info!(cue = %cue, category = %category, "Playing cue");
        }
        Feedback::Connected => {
            info!(cue = %cue, "Playing cue");
        }
    }
}
