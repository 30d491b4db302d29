//! Behavioural contract for `OutboxRepository` implementations
//!
//! Each scenario takes a freshly emptied store and a [`ManualClock`] that
//! drives it, and panics on the first violated expectation. [`run_all`]
//! executes every scenario in sequence, asking the caller for a new store
//! before each one:
//!
//! ```rust,ignore
//! test_utils::contract::run_all(|| async {
//!     let clock = TimeFixtures::clock();
//!     let store = InMemoryOutboxRepository::with_clock(Arc::new(clock.clone()));
//!     ContractSubject::new(store, clock)
//! })
//! .await;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::TestRunner;

use core_kernel::{Clock, ManualClock, OutboxEventId};
use domain_commerce::CanonicalEvent;
use domain_outbox::{OutboxError, OutboxEvent, OutboxRepository, OutboxStatus, RetryPolicy};

use crate::assertions::{assert_claimed_by, assert_disjoint, assert_fresh, assert_ids_in_order, assert_status};
use crate::builders::CanonicalEventBuilder;
use crate::generators::event_batch_strategy;

const LEASE: Duration = Duration::from_secs(30);

/// Store under test plus the clock it reads
pub struct ContractSubject {
    pub repository: Arc<dyn OutboxRepository>,
    pub clock: ManualClock,
}

impl ContractSubject {
    pub fn new(repository: impl OutboxRepository, clock: ManualClock) -> Self {
        Self {
            repository: Arc::new(repository),
            clock,
        }
    }

    fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        self.clock.advance(by);
    }

    async fn save_all(&self, events: Vec<CanonicalEvent>) -> Vec<OutboxEvent> {
        let mut saved = Vec::with_capacity(events.len());
        for event in events {
            saved.push(self.repository.save(event).await.unwrap());
        }
        saved
    }

    async fn save_one(&self, event_type: &str) -> OutboxEvent {
        self.repository
            .save(CanonicalEventBuilder::new().with_type(event_type).build())
            .await
            .unwrap()
    }
}

fn ids(envelopes: &[OutboxEvent]) -> Vec<OutboxEventId> {
    envelopes.iter().map(OutboxEvent::id).collect()
}

/// Runs every scenario, each against a store produced by `fresh`
pub async fn run_all<F, Fut>(mut fresh: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ContractSubject>,
{
    save_returns_fresh_envelope(&fresh().await).await;
    pending_window_follows_save_order(&fresh().await).await;
    default_limit_applies(&fresh().await).await;
    zero_limit_is_rejected(&fresh().await).await;
    processed_is_idempotent(&fresh().await).await;
    repeated_failures_keep_latest_error(&fresh().await).await;
    unknown_ids_are_not_found(&fresh().await).await;
    failed_cannot_be_marked_sent(&fresh().await).await;
    claim_hands_out_oldest_first(&fresh().await).await;
    processed_claim_drops_lease(&fresh().await).await;
    expired_lease_returns_to_pending(&fresh().await).await;
    expired_lease_can_be_reclaimed(&fresh().await).await;
    expired_lease_is_visible_as_pending(&fresh().await).await;
    requeue_honours_backoff_and_max_attempts(&fresh().await).await;
    requeue_keeps_sub_millisecond_backoff(&fresh().await).await;
    generated_payloads_round_trip(&fresh().await).await;
    stats_count_by_status(&fresh().await).await;
    concurrent_claimers_never_share(&fresh().await).await;
    concurrent_status_updates_serialise(&fresh().await).await;
    reports_healthy(&fresh().await).await;
}

pub async fn save_returns_fresh_envelope(subject: &ContractSubject) {
    let original = CanonicalEventBuilder::new()
        .with_type("ProductUpdated")
        .with_field("sku", "SKU-42")
        .with_field("title", "Zażółć gęślą jaźń")
        .with_field("stock", 7)
        .build();

    let saved = subject.repository.save(original.clone()).await.unwrap();
    assert_fresh(&saved);
    assert_eq!(saved.created_at(), subject.clock.now());

    let stored = subject.repository.get_event(saved.id()).await.unwrap();
    assert_fresh(&stored);
    assert_eq!(stored.event(), &original, "payload must be returned verbatim");

    let other = subject.save_one("ProductUpdated").await;
    assert_ne!(saved.id(), other.id());
}

pub async fn pending_window_follows_save_order(subject: &ContractSubject) {
    let e1 = subject.save_one("E1").await;
    let e2 = subject.save_one("E2").await;
    let e3 = subject.save_one("E3").await;

    let first = subject.repository.get_pending_events(Some(2)).await.unwrap();
    assert_ids_in_order(&first, &[e1.id(), e2.id()]);

    subject.repository.mark_as_processed(e1.id()).await.unwrap();

    let rest = subject.repository.get_pending_events(Some(10)).await.unwrap();
    assert_ids_in_order(&rest, &[e2.id(), e3.id()]);
    for envelope in &rest {
        assert_status(envelope, OutboxStatus::Pending);
    }
}

pub async fn default_limit_applies(subject: &ContractSubject) {
    let saved = subject
        .save_all(CanonicalEventBuilder::new().build_many(3))
        .await;

    let pending = subject.repository.get_pending_events(None).await.unwrap();
    assert_ids_in_order(&pending, &ids(&saved));
}

pub async fn zero_limit_is_rejected(subject: &ContractSubject) {
    subject.save_one("OrderCreated").await;

    assert!(matches!(
        subject.repository.get_pending_events(Some(0)).await,
        Err(OutboxError::InvalidLimit(0))
    ));
    assert!(matches!(
        subject.repository.claim_pending("worker", 0, LEASE).await,
        Err(OutboxError::InvalidLimit(0))
    ));
}

pub async fn processed_is_idempotent(subject: &ContractSubject) {
    let saved = subject.save_one("OrderCreated").await;

    subject.repository.mark_as_processed(saved.id()).await.unwrap();
    subject.repository.mark_as_processed(saved.id()).await.unwrap();

    let stored = subject.repository.get_event(saved.id()).await.unwrap();
    assert_status(&stored, OutboxStatus::Sent);
    assert_eq!(stored.attempts(), 0);
    assert!(stored.error().is_none());
    assert_eq!(stored.last_attempt(), Some(subject.clock.now()));
    assert!(subject.repository.get_pending_events(None).await.unwrap().is_empty());
}

pub async fn repeated_failures_keep_latest_error(subject: &ContractSubject) {
    let saved = subject.save_one("OrderCreated").await;

    subject.repository.mark_failed(saved.id(), "connection refused").await.unwrap();
    subject.advance(Duration::from_secs(1));
    subject.repository.mark_failed(saved.id(), "HTTP 502").await.unwrap();

    let stored = subject.repository.get_event(saved.id()).await.unwrap();
    assert_status(&stored, OutboxStatus::Failed);
    assert_eq!(stored.attempts(), 2);
    assert_eq!(stored.error(), Some("HTTP 502"));
    assert_eq!(stored.last_attempt(), Some(subject.clock.now()));
}

pub async fn unknown_ids_are_not_found(subject: &ContractSubject) {
    subject.save_one("OrderCreated").await;
    let missing = OutboxEventId::generate();

    assert!(matches!(
        subject.repository.mark_as_processed(missing).await,
        Err(OutboxError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        subject.repository.mark_failed(missing, "boom").await,
        Err(OutboxError::NotFound(id)) if id == missing
    ));
    assert!(subject.repository.get_event(missing).await.unwrap_err().is_not_found());
}

pub async fn failed_cannot_be_marked_sent(subject: &ContractSubject) {
    let failed = subject.save_one("OrderCreated").await;
    subject.repository.mark_failed(failed.id(), "timeout").await.unwrap();
    assert!(matches!(
        subject.repository.mark_as_processed(failed.id()).await,
        Err(OutboxError::ConcurrentModification { status: OutboxStatus::Failed, .. })
    ));

    let sent = subject.save_one("OrderCreated").await;
    subject.repository.mark_as_processed(sent.id()).await.unwrap();
    assert!(matches!(
        subject.repository.mark_failed(sent.id(), "late failure").await,
        Err(OutboxError::ConcurrentModification { status: OutboxStatus::Sent, .. })
    ));

    let stored = subject.repository.get_event(sent.id()).await.unwrap();
    assert_status(&stored, OutboxStatus::Sent);
    assert_eq!(stored.attempts(), 0);
}

pub async fn claim_hands_out_oldest_first(subject: &ContractSubject) {
    let saved = subject
        .save_all(CanonicalEventBuilder::new().build_many(5))
        .await;
    let expected = ids(&saved);

    let first = subject.repository.claim_pending("worker-a", 3, LEASE).await.unwrap();
    assert_ids_in_order(&first, &expected[..3]);
    let deadline = subject.clock.now() + chrono::Duration::seconds(30);
    for envelope in &first {
        assert_claimed_by(envelope, "worker-a");
        assert_eq!(envelope.lease_expires_at(), Some(deadline));
    }

    let second = subject.repository.claim_pending("worker-b", 10, LEASE).await.unwrap();
    assert_ids_in_order(&second, &expected[3..]);

    assert!(subject.repository.get_pending_events(None).await.unwrap().is_empty());
    assert!(subject
        .repository
        .claim_pending("worker-c", 10, LEASE)
        .await
        .unwrap()
        .is_empty());

    let stored = subject.repository.get_event(expected[0]).await.unwrap();
    assert_claimed_by(&stored, "worker-a");
}

pub async fn processed_claim_drops_lease(subject: &ContractSubject) {
    let saved = subject.save_one("CustomerSynced").await;
    subject.repository.claim_pending("worker-a", 1, LEASE).await.unwrap();

    subject.repository.mark_as_processed(saved.id()).await.unwrap();

    let stored = subject.repository.get_event(saved.id()).await.unwrap();
    assert_status(&stored, OutboxStatus::Sent);
    assert!(stored.claimed_by().is_none());
    assert!(stored.lease_expires_at().is_none());
}

pub async fn expired_lease_returns_to_pending(subject: &ContractSubject) {
    let saved = subject.save_one("ProductUpdated").await;
    subject.repository.claim_pending("worker-a", 10, LEASE).await.unwrap();

    subject.advance(Duration::from_secs(29));
    assert_eq!(subject.repository.release_expired_leases().await.unwrap(), 0);

    subject.advance(Duration::from_secs(2));
    assert_eq!(subject.repository.release_expired_leases().await.unwrap(), 1);

    let pending = subject.repository.get_pending_events(None).await.unwrap();
    assert_ids_in_order(&pending, &[saved.id()]);
    assert!(pending[0].claimed_by().is_none());
    assert!(pending[0].lease_expires_at().is_none());
    assert_eq!(pending[0].attempts(), 0);
}

pub async fn expired_lease_can_be_reclaimed(subject: &ContractSubject) {
    let saved = subject.save_one("ProductUpdated").await;
    subject
        .repository
        .claim_pending("worker-a", 1, Duration::from_secs(5))
        .await
        .unwrap();

    subject.advance(Duration::from_secs(5));
    let reclaimed = subject
        .repository
        .claim_pending("worker-b", 1, Duration::from_secs(5))
        .await
        .unwrap();

    assert_ids_in_order(&reclaimed, &[saved.id()]);
    assert_claimed_by(&reclaimed[0], "worker-b");
}

pub async fn expired_lease_is_visible_as_pending(subject: &ContractSubject) {
    let first = subject.save_one("OrderCreated").await;
    subject
        .repository
        .claim_pending("worker-a", 1, Duration::from_secs(5))
        .await
        .unwrap();
    let second = subject.save_one("OrderCreated").await;

    let before = subject.repository.get_pending_events(None).await.unwrap();
    assert_ids_in_order(&before, &[second.id()]);

    subject.advance(Duration::from_secs(3600));
    let after = subject.repository.get_pending_events(None).await.unwrap();
    assert_ids_in_order(&after, &[first.id(), second.id()]);
    assert_fresh(&after[1]);
    assert_status(&after[0], OutboxStatus::Pending);
    assert!(after[0].claimed_by().is_none());
    assert!(after[0].lease_expires_at().is_none());

    let stored = subject.repository.get_event(first.id()).await.unwrap();
    assert_claimed_by(&stored, "worker-a");
}

pub async fn requeue_honours_backoff_and_max_attempts(subject: &ContractSubject) {
    let policy = RetryPolicy::new(2, Duration::from_secs(10), Duration::from_secs(60));
    let saved = subject.save_one("OrderCreated").await;

    subject.repository.mark_failed(saved.id(), "first").await.unwrap();
    assert_eq!(subject.repository.requeue_failed(&policy).await.unwrap(), 0);

    subject.advance(Duration::from_secs(10));
    assert_eq!(subject.repository.requeue_failed(&policy).await.unwrap(), 1);

    let requeued = subject.repository.get_event(saved.id()).await.unwrap();
    assert_status(&requeued, OutboxStatus::Pending);
    assert_eq!(requeued.attempts(), 1);
    assert!(requeued.error().is_none());

    subject.repository.mark_failed(saved.id(), "second").await.unwrap();
    subject.advance(Duration::from_secs(3600));
    assert_eq!(subject.repository.requeue_failed(&policy).await.unwrap(), 0);

    let exhausted = subject.repository.get_event(saved.id()).await.unwrap();
    assert_status(&exhausted, OutboxStatus::Failed);
    assert_eq!(exhausted.attempts(), 2);
    assert_eq!(exhausted.error(), Some("second"));
}

pub async fn requeue_keeps_sub_millisecond_backoff(subject: &ContractSubject) {
    let policy = RetryPolicy::new(3, Duration::from_micros(1500), Duration::from_secs(1));
    let saved = subject.save_one("OrderCreated").await;
    subject.repository.mark_failed(saved.id(), "timeout").await.unwrap();

    subject.advance(Duration::from_millis(1));
    assert_eq!(subject.repository.requeue_failed(&policy).await.unwrap(), 0);

    subject.advance(Duration::from_micros(500));
    assert_eq!(subject.repository.requeue_failed(&policy).await.unwrap(), 1);
}

/// Saves a generated batch and reads every envelope back
///
/// Values come from a deterministic runner so every store sees the same batch.
pub async fn generated_payloads_round_trip(subject: &ContractSubject) {
    let mut runner = TestRunner::deterministic();
    for _ in 0..4 {
        let events = event_batch_strategy(16)
            .new_tree(&mut runner)
            .map(|tree| tree.current())
            .unwrap_or_default();
        let saved = subject.save_all(events.clone()).await;

        let unique: HashSet<OutboxEventId> = saved.iter().map(OutboxEvent::id).collect();
        assert_eq!(unique.len(), saved.len(), "ids must be unique");

        for (envelope, original) in saved.iter().zip(&events) {
            let stored = subject.repository.get_event(envelope.id()).await.unwrap();
            assert_fresh(&stored);
            assert_eq!(stored.event(), original, "payload must be returned verbatim");
        }

        let pending = subject.repository.get_pending_events(None).await.unwrap();
        let tail = &pending[pending.len() - saved.len()..];
        assert_ids_in_order(tail, &ids(&saved));
    }
}

pub async fn stats_count_by_status(subject: &ContractSubject) {
    let sent = subject.save_one("A").await;
    let failed = subject.save_one("B").await;
    subject.save_one("C").await;
    subject.save_one("D").await;

    subject.repository.mark_as_processed(sent.id()).await.unwrap();
    subject.repository.mark_failed(failed.id(), "boom").await.unwrap();
    subject.repository.claim_pending("worker-a", 1, LEASE).await.unwrap();

    let stats = subject.repository.stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 4);
}

pub async fn concurrent_claimers_never_share(subject: &ContractSubject) {
    const ENVELOPES: usize = 200;
    const WORKERS: usize = 8;

    subject
        .save_all(CanonicalEventBuilder::new().build_many(ENVELOPES))
        .await;

    let mut handles = Vec::with_capacity(WORKERS);
    for worker in 0..WORKERS {
        let repository = Arc::clone(&subject.repository);
        handles.push(tokio::spawn(async move {
            let worker_id = format!("worker-{worker}");
            let mut claimed = Vec::new();
            loop {
                let batch = repository.claim_pending(&worker_id, 7, LEASE).await.unwrap();
                if batch.is_empty() {
                    break;
                }
                for envelope in &batch {
                    assert_claimed_by(envelope, &worker_id);
                }
                claimed.extend(batch);
                tokio::task::yield_now().await;
            }
            claimed
        }));
    }

    let mut batches = Vec::with_capacity(WORKERS);
    for handle in handles {
        batches.push(handle.await.unwrap());
    }

    assert_disjoint(&batches);
    assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), ENVELOPES);
    assert_eq!(subject.repository.stats().await.unwrap().in_progress, ENVELOPES as u64);
}

pub async fn concurrent_status_updates_serialise(subject: &ContractSubject) {
    for _ in 0..10 {
        let saved = subject.save_one("OrderCreated").await;
        let id = saved.id();

        let processed = {
            let repository = Arc::clone(&subject.repository);
            tokio::spawn(async move { repository.mark_as_processed(id).await })
        };
        let failed = {
            let repository = Arc::clone(&subject.repository);
            tokio::spawn(async move { repository.mark_failed(id, "race").await })
        };
        let processed = processed.await.unwrap();
        let failed = failed.await.unwrap();

        let stored = subject.repository.get_event(id).await.unwrap();
        match (processed, failed) {
            (Ok(()), Err(OutboxError::ConcurrentModification { .. })) => {
                assert_status(&stored, OutboxStatus::Sent);
                assert_eq!(stored.attempts(), 0);
            }
            (Err(OutboxError::ConcurrentModification { .. }), Ok(())) => {
                assert_status(&stored, OutboxStatus::Failed);
                assert_eq!(stored.attempts(), 1);
            }
            other => panic!("exactly one update must win, got {:?}", other),
        }
    }
}

pub async fn reports_healthy(subject: &ContractSubject) {
    let health = subject.repository.health_check().await;
    assert!(health.is_healthy(), "unhealthy store: {:?}", health);
}
