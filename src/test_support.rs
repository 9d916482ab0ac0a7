//! Scripted in-memory collaborators for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{ErrorCategory, TransportError};
use crate::sink::{EventSink, Feedback, StreamEvent};
use crate::transport::{ChunkSource, OpenedStream, PresignedRequest, StreamTransport};

/// A tweet-shaped document with its `\r\n` delimiter.
pub fn tweet(id: u64) -> Vec<u8> {
    format!("{{\"id\":{},\"text\":\"tweet number {}\"}}\r\n", id, id).into_bytes()
}

/// A non-event stream message with its `\r\n` delimiter.
pub fn notice(id: u64) -> Vec<u8> {
    format!("{{\"limit\":{{\"track\":{}}}}}\r\n", id).into_bytes()
}

/// Body that replays scripted chunks, then reports end of stream.
///
/// A chunk larger than the caller's destination is split, and the rest is
/// returned by the next read.
#[derive(Default)]
pub struct ScriptedBody {
    chunks: VecDeque<io::Result<Vec<u8>>>,
    requested: Vec<usize>,
    observer: Option<Arc<RecordingSink>>,
    observed: Vec<usize>,
}

impl ScriptedBody {
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    /// Script `data` as chunks of `size` bytes.
    pub fn split(data: &[u8], size: usize) -> Self {
        Self::from_chunks(data.chunks(size).map(<[u8]>::to_vec).collect())
    }

    /// Record the sink's event count at every read.
    pub fn observing(mut self, sink: Arc<RecordingSink>) -> Self {
        self.observer = Some(sink);
        self
    }

    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.chunks
            .push_back(Err(io::Error::new(kind, "scripted read failure")));
    }

    /// Destination lengths passed to each read.
    pub fn requested_lens(&self) -> Vec<usize> {
        self.requested.clone()
    }

    /// Sink event counts seen at each read, when observing.
    pub fn observed_event_counts(&self) -> Vec<usize> {
        self.observed.clone()
    }
}

impl ChunkSource for ScriptedBody {
    async fn read_chunk(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.requested.push(dst.len());
        if let Some(sink) = &self.observer {
            self.observed.push(sink.events().len());
        }

        match self.chunks.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut chunk)) => {
                let n = chunk.len().min(dst.len());
                dst[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.chunks.push_front(Ok(rest));
                }
                Ok(n)
            }
        }
    }
}

/// Transport that hands out scripted responses in order.
///
/// Once the script runs out every open fails with a connection error.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<OpenedStream<ScriptedBody>, TransportError>>>,
    opened: Mutex<Vec<(String, PresignedRequest)>>,
}

impl ScriptedTransport {
    pub fn respond(self, status: u16, body: ScriptedBody) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(OpenedStream { status, body }));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// URL and request of every open call.
    pub fn opened(&self) -> Vec<(String, PresignedRequest)> {
        self.opened.lock().unwrap().clone()
    }
}

impl StreamTransport for ScriptedTransport {
    type Body = ScriptedBody;

    async fn open(
        &self,
        url: &str,
        request: &PresignedRequest,
    ) -> Result<OpenedStream<ScriptedBody>, TransportError> {
        self.opened
            .lock()
            .unwrap()
            .push((url.to_string(), request.clone()));

        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no scripted response",
            )))
        })
    }
}

/// Sink that records every notification.
#[derive(Default)]
pub struct RecordingSink {
    feedback: Mutex<Vec<Feedback>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Value> {
        self.feedback
            .lock()
            .unwrap()
            .iter()
            .filter_map(|feedback| match feedback {
                Feedback::Event(event) => Some(event.document.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|feedback| matches!(feedback, Feedback::Connected))
            .count()
    }

    pub fn failures(&self) -> Vec<ErrorCategory> {
        self.feedback
            .lock()
            .unwrap()
            .iter()
            .filter_map(|feedback| match feedback {
                Feedback::Failure(category) => Some(*category),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn notify_event(&self, event: StreamEvent) {
        self.feedback.lock().unwrap().push(Feedback::Event(event));
    }

    fn notify_connected(&self) {
        self.feedback.lock().unwrap().push(Feedback::Connected);
    }

    fn notify_failure(&self, category: ErrorCategory) {
        self.feedback.lock().unwrap().push(Feedback::Failure(category));
    }
}
