//! The ingestion task's top-level loop.
//!
//! Forever: run a connection attempt, report the failure, advance the
//! backoff for its category, sleep, and try again. There is no terminal
//! state; the owning task is aborted from outside to stop it.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::buffer::RollingBuffer;
use crate::config::Config;
use crate::error::ErrorCategory;
use crate::retry::{BackoffPolicy, RetryState};
use crate::session::StreamClient;
use crate::sink::EventSink;
use crate::transport::{RequestSigner, StreamTransport};

/// Counters kept across connection attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Connection attempts started
    pub sessions_started: u64,

    /// Attempts that reached a healthy status
    pub connects: u64,

    /// Documents recognized at the buffer head
    pub documents_parsed: u64,

    /// Documents forwarded to the sink
    pub events_dispatched: u64,

    /// Documents discarded without the discriminator field
    pub documents_ignored: u64,

    /// Whitespace-only keep-alives skipped
    pub keep_alives: u64,

    /// Attempts that ended with a network failure
    pub network_failures: u64,

    /// Attempts that ended with an HTTP error status
    pub http_errors: u64,

    /// Attempts that ended rate limited
    pub rate_limited: u64,
}

impl IngestStats {
    pub fn record_failure(&mut self, category: ErrorCategory) {
        match category {
            ErrorCategory::Network => self.network_failures += 1,
            ErrorCategory::HttpError => self.http_errors += 1,
            ErrorCategory::RateLimited => self.rate_limited += 1,
        }
    }
}

/// Owns everything that persists across connection attempts.
pub struct IngestionLoop<T, G, S> {
    client: StreamClient<T, G>,
    sink: S,

    /// Allocated once and lent to each session
    buffer: RollingBuffer,

    retry: RetryState,
    policy: BackoffPolicy,
    stats: IngestStats,
}

impl<T, G, S> IngestionLoop<T, G, S>
where
    T: StreamTransport,
    G: RequestSigner,
    S: EventSink,
{
    pub fn new(
        client: StreamClient<T, G>,
        sink: S,
        buffer_capacity: usize,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            client,
            sink,
            buffer: RollingBuffer::with_capacity(buffer_capacity),
            retry: RetryState::new(),
            policy,
            stats: IngestStats::default(),
        }
    }

    pub fn from_config(client: StreamClient<T, G>, sink: S, config: &Config) -> Self {
        Self::new(client, sink, config.buffer_capacity, config.backoff_policy())
    }

    /// Run one connection attempt and compute the delay before the next.
    pub async fn run_attempt(&mut self) -> (ErrorCategory, Duration) {
        let span = info_span!("session", id = %Uuid::new_v4());
        let category = self
            .client
            .run_session(&mut self.buffer, &mut self.retry, &self.sink, &mut self.stats)
            .instrument(span)
            .await;

        self.stats.record_failure(category);
        self.sink.notify_failure(category);
        let delay = self.retry.record_failure(category, &self.policy);

        warn!(
            category = %category,
            delay_ms = delay.as_millis() as u64,
            sessions = self.stats.sessions_started,
            events = self.stats.events_dispatched,
            "Connection attempt ended, backing off"
        );

        (category, delay)
    }

    /// Reconnect forever.
    pub async fn run(mut self) {
        loop {
            let (_, delay) = self.run_attempt().await;
            tokio::time::sleep(delay).await;
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_support::{notice, tweet, RecordingSink, ScriptedBody, ScriptedTransport};
    use crate::transport::StaticSigner;

    fn ingestion_loop(
        transport: ScriptedTransport,
        policy: BackoffPolicy,
    ) -> IngestionLoop<ScriptedTransport, StaticSigner, RecordingSink> {
        let client = StreamClient::new(
            transport,
            StaticSigner::new("OAuth signed", "track=x"),
            "https://stream.example.com/filter.json",
            1024,
        );
        IngestionLoop::new(client, RecordingSink::default(), 1024, policy)
    }

    async fn delays(
        ingestion: &mut IngestionLoop<ScriptedTransport, StaticSigner, RecordingSink>,
        attempts: usize,
    ) -> Vec<(ErrorCategory, u64)> {
        let mut out = Vec::new();
        for _ in 0..attempts {
            let (category, delay) = ingestion.run_attempt().await;
            out.push((category, delay.as_millis() as u64));
        }
        out
    }

    #[test]
    fn test_stats_record_failure() {
        let mut stats = IngestStats::default();
        stats.record_failure(ErrorCategory::Network);
        stats.record_failure(ErrorCategory::Network);
        stats.record_failure(ErrorCategory::HttpError);
        stats.record_failure(ErrorCategory::RateLimited);
        assert_eq!(stats.network_failures, 2);
        assert_eq!(stats.http_errors, 1);
        assert_eq!(stats.rate_limited, 1);
    }

    #[tokio::test]
    async fn test_repeated_network_failures_grow_linearly() {
        let mut ingestion = ingestion_loop(ScriptedTransport::default(), BackoffPolicy::default());

        let out = delays(&mut ingestion, 4).await;

        assert_eq!(
            out,
            vec![
                (ErrorCategory::Network, 250),
                (ErrorCategory::Network, 500),
                (ErrorCategory::Network, 750),
                (ErrorCategory::Network, 1_000),
            ]
        );
        assert_eq!(ingestion.stats().network_failures, 4);
        assert_eq!(ingestion.sink().failures().len(), 4);
    }

    #[tokio::test]
    async fn test_http_errors_then_rate_limit() {
        let transport = ScriptedTransport::default()
            .respond(503, ScriptedBody::default())
            .respond(503, ScriptedBody::default())
            .respond(420, ScriptedBody::default());
        let mut ingestion = ingestion_loop(transport, BackoffPolicy::default());

        let out = delays(&mut ingestion, 3).await;

        assert_eq!(
            out,
            vec![
                (ErrorCategory::HttpError, 5_000),
                (ErrorCategory::HttpError, 10_000),
                (ErrorCategory::RateLimited, 20_000),
            ]
        );
    }

    #[tokio::test]
    async fn test_consecutive_rate_limits() {
        let transport = ScriptedTransport::default()
            .respond(420, ScriptedBody::default())
            .respond(420, ScriptedBody::default())
            .respond(420, ScriptedBody::default());
        let mut ingestion = ingestion_loop(transport, BackoffPolicy::default());

        let out: Vec<u64> = delays(&mut ingestion, 3).await.into_iter().map(|(_, d)| d).collect();

        assert_eq!(out, vec![60_000, 120_000, 240_000]);
    }

    #[tokio::test]
    async fn test_rate_limit_cap_from_policy() {
        let transport = ScriptedTransport::default()
            .respond(420, ScriptedBody::default())
            .respond(420, ScriptedBody::default());
        let mut ingestion = ingestion_loop(transport, BackoffPolicy::with_rate_limit_cap(90_000));

        let out: Vec<u64> = delays(&mut ingestion, 2).await.into_iter().map(|(_, d)| d).collect();

        assert_eq!(out, vec![60_000, 90_000]);
    }

    #[tokio::test]
    async fn test_successful_stream_resets_backoff() {
        let mut body = ScriptedBody::from_chunks(vec![notice(1), tweet(2)]);
        body.push_error(std::io::ErrorKind::ConnectionReset);
        let transport = ScriptedTransport::default()
            .fail(TransportError::Timeout)
            .fail(TransportError::Timeout)
            .respond(200, body);
        let mut ingestion = ingestion_loop(transport, BackoffPolicy::default());

        let out = delays(&mut ingestion, 4).await;

        assert_eq!(
            out.iter().map(|&(_, d)| d).collect::<Vec<_>>(),
            vec![250, 500, 250, 500]
        );
        assert_eq!(ingestion.stats().connects, 1);
        assert_eq!(ingestion.stats().events_dispatched, 1);
        assert_eq!(ingestion.stats().documents_ignored, 1);
        assert_eq!(ingestion.sink().events().len(), 1);
        assert_eq!(ingestion.sink().connects(), 1);
        assert_eq!(ingestion.retry_state().current_delay_ms(), 500);
    }

    #[tokio::test]
    async fn test_failure_notified_after_each_attempt() {
        let transport = ScriptedTransport::default().respond(401, ScriptedBody::default());
        let mut ingestion = ingestion_loop(transport, BackoffPolicy::default());

        delays(&mut ingestion, 2).await;

        assert_eq!(
            ingestion.sink().failures(),
            vec![ErrorCategory::HttpError, ErrorCategory::Network]
        );
        assert_eq!(ingestion.stats().sessions_started, 2);
    }
}
