//! Dispatcher behaviour against a clocked in-memory store

use std::sync::Arc;
use std::time::Duration;

use domain_outbox::{
    Dispatcher, DispatcherConfig, InMemoryOutboxRepository, OutboxRepository, OutboxStatus, RetryPolicy,
};
use test_utils::{CanonicalEventBuilder, RecordingPublisher, TimeFixtures};

fn config() -> DispatcherConfig {
    DispatcherConfig::default()
        .with_worker_id("relay-test")
        .with_batch_size(10)
        .with_lease(Duration::from_secs(30))
        .with_poll_interval(Duration::from_millis(5))
        .with_retry(RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10)))
}

#[tokio::test]
async fn test_rejected_events_are_failed_and_others_delivered() {
    let store = Arc::new(InMemoryOutboxRepository::new());
    let order = store
        .save(CanonicalEventBuilder::new().with_type("OrderCreated").build())
        .await
        .unwrap();
    let legacy = store
        .save(CanonicalEventBuilder::new().with_type("LegacyPing").build())
        .await
        .unwrap();

    let publisher = Arc::new(RecordingPublisher::new().rejecting("LegacyPing"));
    let dispatcher = Dispatcher::new(store.clone(), publisher.clone(), config());

    let report = dispatcher.run_once().await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(publisher.published().await, vec![order.id()]);
    let failed = store.get_event(legacy.id()).await.unwrap();
    assert_eq!(failed.status(), OutboxStatus::Failed);
    assert!(failed.error().unwrap_or_default().contains("LegacyPing"));
}

#[tokio::test]
async fn test_outage_is_retried_after_backoff() {
    let clock = TimeFixtures::clock();
    let store = Arc::new(InMemoryOutboxRepository::with_clock(Arc::new(clock.clone())));
    let saved = store.save(CanonicalEventBuilder::new().build()).await.unwrap();

    let publisher = Arc::new(RecordingPublisher::new().with_outages(1));
    let dispatcher = Dispatcher::new(store.clone(), publisher.clone(), config());

    let first = dispatcher.run_once().await.unwrap();
    assert_eq!(first.failed, 1);

    let early = dispatcher.run_once().await.unwrap();
    assert_eq!(early.requeued, 0);
    assert!(early.is_idle());

    clock.advance(chrono::Duration::seconds(1));
    let retried = dispatcher.run_once().await.unwrap();
    assert_eq!(retried.requeued, 1);
    assert_eq!(retried.sent, 1);

    let stored = store.get_event(saved.id()).await.unwrap();
    assert_eq!(stored.status(), OutboxStatus::Sent);
    assert_eq!(stored.attempts(), 1);
    assert_eq!(publisher.calls(), 2);
}

#[tokio::test]
async fn test_run_until_drains_backlog_before_shutdown() {
    let store = Arc::new(InMemoryOutboxRepository::new());
    for event in CanonicalEventBuilder::new().build_many(25) {
        store.save(event).await.unwrap();
    }

    let publisher = Arc::new(RecordingPublisher::new());
    let dispatcher = Dispatcher::new(store.clone(), publisher.clone(), config());

    let report = dispatcher
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await;

    assert_eq!(report.sent, 25);
    assert_eq!(publisher.published().await.len(), 25);
    assert_eq!(store.stats().await.unwrap().backlog(), 0);
}
