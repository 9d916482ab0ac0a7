//! Stream Notifier Library
//!
//! This library subscribes to a filtered live event stream and turns matching
//! events into feedback notifications:
//!
//! - **buffer**: Fixed-capacity rolling byte buffer
//! - **framer**: Newline-delimited JSON framing and the per-connection read loop
//! - **transport**: Streaming endpoint transport and the chunked-read primitive
//! - **session**: One connection attempt with status classification
//! - **retry**: Category-specific reconnect backoff
//! - **ingest**: The forever-reconnecting ingestion loop
//! - **sink**: Event sink interface and the channel-backed feedback queue
//! - **error**: Failure categories and transport errors
//! - **config**: Environment-based configuration
//!
//! # Example
//!
//! ```no_run
//! use stream_notifier::config::Config;
//! use stream_notifier::ingest::IngestionLoop;
//! use stream_notifier::session::StreamClient;
//! use stream_notifier::sink::ChannelSink;
//! use stream_notifier::transport::{HttpTransport, StaticSigner};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Load configuration from environment
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     // Build the client for the streaming endpoint
//!     let transport = HttpTransport::new(&config).expect("Failed to create transport");
//!     let client = StreamClient::from_config(transport, StaticSigner::from_config(&config), &config);
//!
//!     // Notifications are queued for a consumer task
//!     let (sink, _feedback) = ChannelSink::new(config.event_queue_capacity);
//!
//!     // Reconnect forever
//!     IngestionLoop::from_config(client, sink, &config).run().await;
//! }
//! ```

// Module declarations
pub mod buffer;
pub mod config;
pub mod error;
pub mod framer;
pub mod ingest;
pub mod retry;
pub mod session;
pub mod sink;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root for convenience
pub use buffer::RollingBuffer;
pub use config::{Config, ConfigError};
pub use error::{ErrorCategory, TransportError};
pub use framer::{frame_head, is_notable, Frame, ParsedDocument, StreamFramer};
pub use ingest::{IngestStats, IngestionLoop};
pub use retry::{next_delay, BackoffPolicy, RetryState};
pub use session::{classify_status, StreamClient};
pub use sink::{ChannelSink, Cue, EventSink, Feedback, StreamEvent};
pub use transport::{
    ChunkSource, HttpTransport, PresignedRequest, RequestSigner, StaticSigner, StreamTransport,
};
