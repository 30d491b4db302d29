//! Outbox dispatcher
//!
//! Each pass of the dispatcher:
//!
//! 1. returns envelopes with expired leases to `PENDING`
//! 2. requeues `FAILED` envelopes whose backoff has elapsed
//! 3. claims a batch under this worker's lease
//! 4. publishes each envelope and records the outcome
//!
//! Delivery is at-least-once. If the status update after a successful publish
//! fails, the envelope stays `IN_PROGRESS` and is picked up again once its
//! lease expires, so consumers deduplicate on the idempotency key.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::envelope::OutboxEvent;
use crate::error::OutboxError;
use crate::repository::{OutboxRepository, DEFAULT_PENDING_LIMIT};
use crate::retry::RetryPolicy;

/// Failure reported by a transport
#[derive(Debug, Error)]
pub enum PublishError {
    /// The transport could not be reached; the envelope will be retried
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The transport refused the event
    #[error("Rejected by transport: {0}")]
    Rejected(String),
}

/// Transport that delivers envelopes to downstream consumers
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: &OutboxEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    async fn publish(&self, envelope: &OutboxEvent) -> Result<(), PublishError> {
        (**self).publish(envelope).await
    }
}

/// Publisher that writes each event to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, envelope: &OutboxEvent) -> Result<(), PublishError> {
        let event = envelope.event();
        info!(
            id = %envelope.id(),
            event_type = %event.event_type,
            version = %event.version,
            tenant_id = %event.metadata.tenant_id,
            channel_id = %event.metadata.channel_id,
            idempotency_key = %event.metadata.idempotency_key,
            trace_id = %event.metadata.trace_id,
            "Publishing outbox event"
        );
        Ok(())
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Lease holder name recorded on claimed envelopes
    pub worker_id: String,
    pub batch_size: u32,
    pub lease: Duration,
    /// Idle wait between passes
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("relay-{}", std::process::id()),
            batch_size: DEFAULT_PENDING_LIMIT,
            lease: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Counts from one or more dispatcher passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub claimed: u64,
    pub sent: u64,
    pub failed: u64,
    pub requeued: u64,
    pub released: u64,
}

impl DispatchReport {
    /// True if the pass found nothing to do
    pub fn is_idle(&self) -> bool {
        *self == DispatchReport::default()
    }

    fn absorb(&mut self, other: DispatchReport) {
        self.claimed += other.claimed;
        self.sent += other.sent;
        self.failed += other.failed;
        self.requeued += other.requeued;
        self.released += other.released;
    }
}

/// Polls an outbox store and hands claimed envelopes to a publisher
pub struct Dispatcher<P> {
    repository: Arc<dyn OutboxRepository>,
    publisher: P,
    config: DispatcherConfig,
}

impl<P: EventPublisher> Dispatcher<P> {
    pub fn new(repository: Arc<dyn OutboxRepository>, publisher: P, config: DispatcherConfig) -> Self {
        Self {
            repository,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Runs a single pass
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn run_once(&self) -> Result<DispatchReport, OutboxError> {
        let mut report = DispatchReport {
            released: self.repository.release_expired_leases().await?,
            requeued: self.repository.requeue_failed(&self.config.retry).await?,
            ..Default::default()
        };

        let batch = self
            .repository
            .claim_pending(&self.config.worker_id, self.config.batch_size, self.config.lease)
            .await?;
        report.claimed = batch.len() as u64;

        for envelope in &batch {
            match self.publisher.publish(envelope).await {
                Ok(()) => match self.repository.mark_as_processed(envelope.id()).await {
                    Ok(()) => report.sent += 1,
                    Err(e) => warn!(
                        id = %envelope.id(),
                        error = %e,
                        "Published but could not mark as sent; will redeliver after lease expiry"
                    ),
                },
                Err(publish_error) => {
                    let reason = publish_error.to_string();
                    match self.repository.mark_failed(envelope.id(), &reason).await {
                        Ok(()) => {
                            report.failed += 1;
                            warn!(id = %envelope.id(), error = %reason, "Outbox event delivery failed");
                        }
                        Err(e) => warn!(
                            id = %envelope.id(),
                            error = %e,
                            "Could not record delivery failure"
                        ),
                    }
                }
            }
        }

        if !report.is_idle() {
            debug!(?report, "Dispatch pass complete");
        }
        Ok(report)
    }

    /// Runs passes until `shutdown` resolves, returning the accumulated counts
    ///
    /// A full batch triggers the next pass immediately; otherwise the
    /// dispatcher sleeps for `poll_interval`. Errors from a pass are logged
    /// and the loop continues.
    pub async fn run_until<F>(&self, shutdown: F) -> DispatchReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut total = DispatchReport::default();

        loop {
            let drained = match self.run_once().await {
                Ok(report) => {
                    total.absorb(report);
                    report.claimed < u64::from(self.config.batch_size)
                }
                Err(e) => {
                    error!(error = %e, retryable = e.is_retryable(), "Dispatch pass failed");
                    true
                }
            };

            if drained {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            } else {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = std::future::ready(()) => {}
                }
            }
        }

        info!(?total, "Dispatcher stopped");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOutboxRepository;
    use core_kernel::{ChannelId, TenantId};
    use domain_commerce::{CanonicalEvent, EventMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> CanonicalEvent {
        CanonicalEvent::new(
            "OrderCreated",
            serde_json::Map::new(),
            EventMetadata::new(TenantId::new(), ChannelId::new()),
        )
    }

    /// Fails every call until `failures` is used up
    #[derive(Default)]
    struct FlakyPublisher {
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, _envelope: &OutboxEvent) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(PublishError::Unavailable("broker down".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_config_builder() {
        let config = DispatcherConfig::default()
            .with_worker_id("relay-test")
            .with_batch_size(5)
            .with_lease(Duration::from_secs(10))
            .with_poll_interval(Duration::from_millis(50));

        assert_eq!(config.worker_id, "relay-test");
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.lease, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[tokio::test]
    async fn test_run_once_delivers_pending_events() {
        let store = Arc::new(InMemoryOutboxRepository::new());
        store.save(event()).await.unwrap();
        store.save(event()).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), TracingPublisher, DispatcherConfig::default());
        let report = dispatcher.run_once().await.unwrap();

        assert_eq!(report.claimed, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(store.stats().await.unwrap().sent, 2);

        assert!(dispatcher.run_once().await.unwrap().is_idle());
    }

    #[tokio::test]
    async fn test_publish_failure_marks_failed() {
        let store = Arc::new(InMemoryOutboxRepository::new());
        let saved = store.save(event()).await.unwrap();
        let publisher = FlakyPublisher {
            failures: AtomicUsize::new(1),
            ..Default::default()
        };

        let dispatcher = Dispatcher::new(store.clone(), publisher, DispatcherConfig::default());
        let report = dispatcher.run_once().await.unwrap();

        assert_eq!(report.failed, 1);
        let stored = store.get_event(saved.id()).await.unwrap();
        assert_eq!(stored.attempts(), 1);
        assert_eq!(stored.error(), Some("Transport unavailable: broker down"));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let store = Arc::new(InMemoryOutboxRepository::new());
        store.save(event()).await.unwrap();

        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(FlakyPublisher::default()),
            DispatcherConfig::default().with_poll_interval(Duration::from_millis(10)),
        );
        let total = dispatcher
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert_eq!(total.sent, 1);
        assert!(dispatcher.publisher().calls.load(Ordering::SeqCst) >= 1);
    }
}
