//! Publisher doubles for dispatcher tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use core_kernel::OutboxEventId;
use domain_outbox::{EventPublisher, OutboxEvent, PublishError};

/// Records every envelope it is asked to publish
///
/// Envelopes whose event type is in the reject set fail with
/// `PublishError::Rejected`. The first `outages` calls fail with
/// `PublishError::Unavailable` regardless of type.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<OutboxEventId>>,
    rejected_types: HashSet<String>,
    outages: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, event_type: impl Into<String>) -> Self {
        self.rejected_types.insert(event_type.into());
        self
    }

    pub fn with_outages(self, count: usize) -> Self {
        self.outages.store(count, Ordering::SeqCst);
        self
    }

    /// Ids of successfully published envelopes, in publish order
    pub async fn published(&self) -> Vec<OutboxEventId> {
        self.published.lock().await.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, envelope: &OutboxEvent) -> Result<(), PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(PublishError::Unavailable("broker unreachable".to_string()));
        }

        if self.rejected_types.contains(envelope.event_type()) {
            return Err(PublishError::Rejected(format!(
                "{} is not accepted downstream",
                envelope.event_type()
            )));
        }

        self.published.lock().await.push(envelope.id());
        Ok(())
    }
}
