//! Streaming endpoint transport.
//!
//! The ingestion core sees the network through two narrow seams:
//!
//! - [`StreamTransport`] opens the signed POST and yields the status code plus
//!   a body.
//! - [`ChunkSource`] is the chunked-read primitive over that body: each call
//!   suspends until at least one byte is available, the stream ends, or the
//!   transport fails.
//!
//! [`HttpTransport`] implements both on top of `reqwest`. Request signing is
//! supplied by a [`RequestSigner`] collaborator as an opaque value.

use std::future::Future;
use std::io;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::TransportError;

/// Content type of the filter body.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Chunked-read primitive over a response body.
pub trait ChunkSource: Send {
    /// Read up to `dst.len()` bytes into `dst`.
    ///
    /// Returns the number of bytes read; `Ok(0)` means the stream ended.
    fn read_chunk(&mut self, dst: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

/// A signed request ready to be sent: the `Authorization` header value and
/// the form body it was signed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedRequest {
    pub authorization: String,
    pub body: String,
}

/// Produces the signed `Authorization` value and POST body for the stream.
pub trait RequestSigner {
    fn sign(&self) -> PresignedRequest;
}

/// Signer that hands out a request signed ahead of time.
///
/// Every connection attempt replays the same header. An OAuth 1.0a signature
/// carries a fixed timestamp and nonce, so the server eventually rejects it
/// as a replay and every retry then ends as an HTTP error. Long-running
/// deployments need a [`RequestSigner`] that signs each attempt afresh.
#[derive(Debug, Clone)]
pub struct StaticSigner {
    request: PresignedRequest,
}

impl StaticSigner {
    pub fn new(authorization: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            request: PresignedRequest {
                authorization: authorization.into(),
                body: body.into(),
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.authorization.clone(), config.post_body.clone())
    }
}

impl RequestSigner for StaticSigner {
    fn sign(&self) -> PresignedRequest {
        self.request.clone()
    }
}

/// An opened streaming response.
#[derive(Debug)]
pub struct OpenedStream<B> {
    /// HTTP status code of the response
    pub status: u16,

    /// The response body
    pub body: B,
}

/// Opens the streaming connection.
pub trait StreamTransport {
    type Body: ChunkSource;

    /// POST `request` to `url`, write the body and fetch the response headers.
    fn open(
        &self,
        url: &str,
        request: &PresignedRequest,
    ) -> impl Future<Output = Result<OpenedStream<Self::Body>, TransportError>> + Send;
}

/// `reqwest`-backed transport.
///
/// The client only carries a connect timeout; a whole-request timeout would
/// cut off a response that is meant to never end. Stalls are detected per
/// read instead.
pub struct HttpTransport {
    client: Client,
    stall_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Request` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        Self::with_settings(config.connect_timeout, config.stall_timeout)
    }

    pub fn with_settings(
        connect_timeout: Duration,
        stall_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            client,
            stall_timeout,
        })
    }

    /// Get the per-read stall timeout.
    pub fn stall_timeout(&self) -> Duration {
        self.stall_timeout
    }
}

impl StreamTransport for HttpTransport {
    type Body = HttpBody;

    async fn open(
        &self,
        url: &str,
        request: &PresignedRequest,
    ) -> Result<OpenedStream<HttpBody>, TransportError> {
        debug!(url = %url, body_len = request.body.len(), "Opening streaming connection");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, request.authorization.as_str())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.body.clone())
            .send()
            .await?;

        Ok(OpenedStream {
            status: response.status().as_u16(),
            body: HttpBody::new(response, self.stall_timeout),
        })
    }
}

/// Response body adapted to [`ChunkSource`].
///
/// Network chunks arrive in sizes chosen by the server; any part of a chunk
/// that does not fit the caller's destination is kept for the next read.
pub struct HttpBody {
    response: reqwest::Response,
    pending: Vec<u8>,
    pending_pos: usize,
    stall_timeout: Duration,
}

impl HttpBody {
    fn new(response: reqwest::Response, stall_timeout: Duration) -> Self {
        Self {
            response,
            pending: Vec::new(),
            pending_pos: 0,
            stall_timeout,
        }
    }
}

impl ChunkSource for HttpBody {
    async fn read_chunk(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        while self.pending_pos >= self.pending.len() {
            let next = tokio::time::timeout(self.stall_timeout, self.response.chunk())
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "stream stalled"))?
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            match next {
                Some(chunk) => {
                    self.pending.clear();
                    self.pending.extend_from_slice(&chunk);
                    self.pending_pos = 0;
                }
                None => return Ok(0),
            }
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(dst.len());
        dst[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}
