//! Newline-delimited JSON framing over a [`RollingBuffer`].
//!
//! The stream carries JSON documents separated by `\r\n`, with bare newlines
//! sent as keep-alives. There is no length prefix, so a newline in freshly
//! read bytes is only a hint that a complete document may now sit at the
//! buffer head. The JSON parser decides: if a document parses from the head,
//! it is dispatched and its bytes discarded; otherwise the framer waits for
//! more data.
//!
//! A buffer that fills completely without yielding a document ends the
//! session as a network-class failure.

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::RollingBuffer;
use crate::error::{ErrorCategory, TransportError};
use crate::ingest::IngestStats;
use crate::retry::RetryState;
use crate::sink::{EventSink, StreamEvent};
use crate::transport::ChunkSource;

/// Default number of bytes requested per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Top-level field whose presence marks a notable event.
pub const DISCRIMINATOR_FIELD: &str = "text";

/// A document recognized at the buffer head.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub document: Value,

    /// Offset of the last byte the document consumed, including the
    /// whitespace that delimits it
    pub end_offset: usize,
}

impl ParsedDocument {
    /// Number of bytes to discard from the head.
    pub fn consumed_len(&self) -> usize {
        self.end_offset + 1
    }

    pub fn is_notable(&self) -> bool {
        is_notable(&self.document)
    }
}

/// Outcome of examining the buffer head.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A complete document
    Document(ParsedDocument),

    /// Only whitespace, through `end_offset`
    KeepAlive { end_offset: usize },

    /// Not yet a complete document
    Incomplete,
}

/// Whether `document` carries the discriminator field at the top level.
pub fn is_notable(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|fields| fields.contains_key(DISCRIMINATOR_FIELD))
}

/// Try to recognize one document at the start of `content`.
///
/// Parse errors are never surfaced: malformed and truncated input both mean
/// "need more data".
pub fn frame_head(content: &[u8]) -> Frame {
    let Some(start) = content.iter().position(|b| !b.is_ascii_whitespace()) else {
        return match content.len() {
            0 => Frame::Incomplete,
            len => Frame::KeepAlive {
                end_offset: len - 1,
            },
        };
    };

    let mut stream = serde_json::Deserializer::from_slice(content).into_iter::<Value>();
    match stream.next() {
        Some(Ok(document)) => {
            let mut end = stream.byte_offset();

            // A bare number running into the end of the buffer may still be
            // missing digits.
            if end == content.len() && document.is_number() {
                return Frame::Incomplete;
            }

            while end < content.len() && content[end].is_ascii_whitespace() {
                end += 1;
            }

            Frame::Document(ParsedDocument {
                document,
                end_offset: end - 1,
            })
        }
        Some(Err(e)) => {
            trace!(
                error = %e,
                eof = e.is_eof(),
                head_offset = start,
                "No complete document at buffer head"
            );
            Frame::Incomplete
        }
        None => Frame::Incomplete,
    }
}

/// Drives the read loop of one connection attempt.
pub struct StreamFramer<'b> {
    buffer: &'b mut RollingBuffer,
    read_chunk_size: usize,
}

impl<'b> StreamFramer<'b> {
    /// # Panics
    /// Panics if `read_chunk_size == 0`.
    pub fn new(buffer: &'b mut RollingBuffer, read_chunk_size: usize) -> Self {
        assert!(read_chunk_size > 0, "read chunk size must be > 0");
        Self {
            buffer,
            read_chunk_size,
        }
    }

    /// Read and frame until the body fails, ends, or overflows the buffer.
    ///
    /// Every parsed document resets `retry`. The returned category is always
    /// [`ErrorCategory::Network`]: the loop only ends on transport-class
    /// conditions.
    pub async fn run<R, S>(
        &mut self,
        body: &mut R,
        sink: &S,
        retry: &mut RetryState,
        stats: &mut IngestStats,
    ) -> ErrorCategory
    where
        R: ChunkSource,
        S: EventSink,
    {
        loop {
            let read_start = self.buffer.len();
            let request_len = self.read_chunk_size.min(self.buffer.remaining());
            trace!(
                request_len = request_len,
                offset = read_start,
                "Reading stream chunk"
            );

            let region = &mut self.buffer.writable_region()[..request_len];
            let bytes_read = match body.read_chunk(region).await {
                Ok(0) => {
                    warn!("Stream ended by server");
                    return ErrorCategory::Network;
                }
                Ok(n) if n > request_len => {
                    error!(
                        bytes_read = n,
                        request_len = request_len,
                        "Read reported more bytes than requested"
                    );
                    return ErrorCategory::Network;
                }
                Ok(n) => n,
                Err(e) => {
                    let e = TransportError::from(e);
                    error!(error = %e, "Error reading response body");
                    return e.category();
                }
            };

            self.buffer.commit(bytes_read);
            debug!(
                bytes_read = bytes_read,
                valid_bytes = self.buffer.len(),
                "Read stream chunk"
            );

            if self.buffer.valid_content()[read_start..].contains(&b'\n') {
                let frames = self.drain(sink, retry, stats);
                trace!(frames = frames, valid_bytes = self.buffer.len(), "Drained buffer head");
            }

            // Any extraction frees space, so a full buffer here means nothing
            // usable was found.
            if self.buffer.remaining() == 0 {
                error!(
                    capacity = self.buffer.capacity(),
                    "Buffer filled without a complete document"
                );
                return ErrorCategory::Network;
            }
        }
    }

    /// Extract documents from the head while the remaining content still
    /// holds a newline. Returns the number of frames removed.
    fn drain<S: EventSink>(
        &mut self,
        sink: &S,
        retry: &mut RetryState,
        stats: &mut IngestStats,
    ) -> usize {
        let mut frames = 0;

        loop {
            match frame_head(self.buffer.valid_content()) {
                Frame::Document(parsed) => {
                    let end_offset = parsed.end_offset;
                    stats.documents_parsed += 1;
                    retry.reset();

                    if parsed.is_notable() {
                        info!(bytes = parsed.consumed_len(), "Received a notable event");
                        stats.events_dispatched += 1;
                        sink.notify_event(StreamEvent::new(parsed.document));
                    } else {
                        stats.documents_ignored += 1;
                        info!(document = %parsed.document, "Ignoring non-event document");
                    }

                    self.buffer.discard_through(end_offset);
                }
                Frame::KeepAlive { end_offset } => {
                    stats.keep_alives += 1;
                    debug!(bytes = end_offset + 1, "Skipping keep-alive");
                    self.buffer.discard_through(end_offset);
                }
                Frame::Incomplete => break,
            }

            frames += 1;
            if !self.buffer.valid_content().contains(&b'\n') {
                break;
            }
        }

        frames
    }
}
