//! One connection attempt against the streaming endpoint.
//!
//! A session moves through `Opening -> Streaming -> Closed(category)`:
//!
//! 1. Obtain the signed request from the [`RequestSigner`].
//! 2. Open the POST, write the body and fetch headers. Any failure is
//!    [`ErrorCategory::Network`].
//! 3. Classify the status code. 420 is [`ErrorCategory::RateLimited`], any
//!    other status >= 400 is [`ErrorCategory::HttpError`].
//! 4. On a healthy status, reset the retry delay, notify the sink and run the
//!    [`StreamFramer`] read loop until it fails.
//!
//! A session never retries on its own; it always yields exactly one category.
//! The connection is released when the session returns, on every path.

use tracing::{error, info};

use crate::buffer::RollingBuffer;
use crate::config::Config;
use crate::error::ErrorCategory;
use crate::framer::StreamFramer;
use crate::ingest::IngestStats;
use crate::retry::RetryState;
use crate::sink::EventSink;
use crate::transport::{RequestSigner, StreamTransport};

/// Status code the streaming API uses to signal rate limiting.
pub const RATE_LIMITED_STATUS: u16 = 420;

/// Map a response status to a failure category.
///
/// Returns `None` for statuses below 400, which start a stream.
pub fn classify_status(status: u16) -> Option<ErrorCategory> {
    match status {
        RATE_LIMITED_STATUS => Some(ErrorCategory::RateLimited),
        s if s >= 400 => Some(ErrorCategory::HttpError),
        _ => None,
    }
}

/// Client for the streaming endpoint.
///
/// Holds the long-lived collaborators; each call to
/// [`run_session`](Self::run_session) performs one connection attempt.
pub struct StreamClient<T, G> {
    /// Opens connections to the endpoint
    transport: T,

    /// Supplies the signed request
    signer: G,

    /// URL of the streaming endpoint
    stream_url: String,

    /// Bytes requested per body read
    read_chunk_size: usize,
}

impl<T, G> StreamClient<T, G>
where
    T: StreamTransport,
    G: RequestSigner,
{
    pub fn new(
        transport: T,
        signer: G,
        stream_url: impl Into<String>,
        read_chunk_size: usize,
    ) -> Self {
        Self {
            transport,
            signer,
            stream_url: stream_url.into(),
            read_chunk_size,
        }
    }

    pub fn from_config(transport: T, signer: G, config: &Config) -> Self {
        Self::new(
            transport,
            signer,
            config.stream_url.clone(),
            config.read_chunk_size,
        )
    }

    /// Run one connection attempt to completion.
    ///
    /// `buffer` is reset before use and exclusively borrowed for the
    /// attempt. `retry` is reset on a healthy connect and on every document.
    pub async fn run_session<S: EventSink>(
        &self,
        buffer: &mut RollingBuffer,
        retry: &mut RetryState,
        sink: &S,
        stats: &mut IngestStats,
    ) -> ErrorCategory {
        buffer.reset();
        stats.sessions_started += 1;

        let request = self.signer.sign();

        info!(url = %self.stream_url, "Opening HTTP connection...");
        let opened = match self.transport.open(&self.stream_url, &request).await {
            Ok(opened) => opened,
            Err(e) => {
                error!(error = %e, "Error opening connection");
                return e.category();
            }
        };

        if let Some(category) = classify_status(opened.status) {
            error!(
                status = opened.status,
                category = %category,
                "HTTP response status code"
            );
            return category;
        }

        retry.reset();
        stats.connects += 1;
        sink.notify_connected();
        info!(status = opened.status, "HTTP response status code. Entering read loop");

        let mut body = opened.body;
        StreamFramer::new(buffer, self.read_chunk_size)
            .run(&mut body, sink, retry, stats)
            .await
    }

    /// Get the configured stream URL.
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Get the number of bytes requested per read.
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
