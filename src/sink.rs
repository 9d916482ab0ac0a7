//! Outbound notifications from the ingestion task.
//!
//! The ingestion task reports three things to its collaborators: a successful
//! connect, each notable event, and each failed attempt. Delivery is
//! fire-and-forget; [`ChannelSink`] enqueues with `try_send` and drops the
//! notification when the queue is full, so a stalled consumer never blocks
//! ingestion.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ErrorCategory;

/// Default number of notifications that may wait for the consumer.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// A notable document pulled off the stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    /// When the document was recognized
    pub received_at: DateTime<Utc>,

    /// The parsed document
    pub document: Value,
}

impl StreamEvent {
    pub fn new(document: Value) -> Self {
        Self {
            received_at: Utc::now(),
            document,
        }
    }

    /// The discriminator field's value, when it is a string.
    pub fn text(&self) -> Option<&str> {
        self.document.get("text").and_then(Value::as_str)
    }
}

/// Receiver of ingestion notifications.
///
/// Implementations must not block the caller.
pub trait EventSink {
    /// A notable event was recognized.
    fn notify_event(&self, event: StreamEvent);

    /// A connection opened with a healthy status.
    fn notify_connected(&self) {}

    /// A connection attempt ended with the given category.
    fn notify_failure(&self, _category: ErrorCategory) {}
}

/// A notification as carried over the channel.
#[derive(Debug, Clone)]
pub enum Feedback {
    Connected,
    Event(StreamEvent),
    Failure(ErrorCategory),
}

/// Audible/visible cue a feedback consumer should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Connected,
    Event,
    Error,
}

impl Feedback {
    pub fn cue(&self) -> Cue {
        match self {
            Feedback::Connected => Cue::Connected,
            Feedback::Event(_) => Cue::Event,
            Feedback::Failure(_) => Cue::Error,
        }
    }
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cue::Connected => write!(f, "connected"),
            Cue::Event => write!(f, "event"),
            Cue::Error => write!(f, "error"),
        }
    }
}

/// Errors that can occur when enqueueing a notification.
#[derive(Debug, PartialEq, Eq)]
pub enum SinkError {
    /// The queue is full
    Full,

    /// The consumer has gone away
    Closed,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Full => write!(f, "Feedback queue is full"),
            SinkError::Closed => write!(f, "Feedback queue has been closed"),
        }
    }
}

impl std::error::Error for SinkError {}

/// [`EventSink`] backed by a bounded mpsc channel.
pub struct ChannelSink {
    tx: mpsc::Sender<Feedback>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiver its consumer reads from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Feedback>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink = Self {
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, rx)
    }

    /// Enqueue without waiting.
    pub fn try_send(&self, feedback: Feedback) -> Result<(), SinkError> {
        self.tx.try_send(feedback).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    /// Number of notifications dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn deliver(&self, feedback: Feedback) {
        let cue = feedback.cue();
        if let Err(e) = self.try_send(feedback) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(error = %e, cue = %cue, dropped = dropped, "Dropping feedback notification");
        }
    }
}

impl EventSink for ChannelSink {
    fn notify_event(&self, event: StreamEvent) {
        self.deliver(Feedback::Event(event));
    }

    fn notify_connected(&self) {
        self.deliver(Feedback::Connected);
    }

    fn notify_failure(&self, category: ErrorCategory) {
        self.deliver(Feedback::Failure(category));
    }
}

/// Consume notifications until the channel closes, handing each cue to
/// `on_cue`.
///
/// This is the counterpart of the device's audio task; the driver itself is
/// supplied by the caller.
pub async fn feedback_task<F>(mut rx: mpsc::Receiver<Feedback>, mut on_cue: F)
where
    F: FnMut(Cue, &Feedback),
{
    while let Some(feedback) = rx.recv().await {
        let cue = feedback.cue();
        match &feedback {
            Feedback::Event(event) => {
                debug!(text = ?event.text(), received_at = %event.received_at, "Event feedback");
            }
            Feedback::Failure(category) => {
                debug!(category = %category, "Failure feedback");
            }
            Feedback::Connected => {}
        }
        on_cue(cue, &feedback);
    }
    info!("Feedback channel closed");
}
