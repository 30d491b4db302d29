//! In-memory outbox store
//!
//! Envelopes live in a `Vec` in insertion order with a side index by id, all
//! behind one `tokio::sync::RwLock`. Every mutating operation holds the write
//! lock for its whole read-modify-write, which serialises concurrent claims
//! and status changes.
//!
//! Producers that need their outbox writes to land atomically with other work
//! stage them in an [`OutboxUnitOfWork`] and commit once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use core_kernel::{
    Clock, DomainPort, HealthCheckResult, HealthCheckable, OutboxEventId, SharedClock, SystemClock,
};
use domain_commerce::CanonicalEvent;

use crate::envelope::{OutboxEvent, Transition};
use crate::error::OutboxError;
use crate::repository::{resolve_limit, OutboxRepository, OutboxStats};
use crate::retry::RetryPolicy;

#[derive(Debug, Default)]
struct Envelopes {
    rows: Vec<OutboxEvent>,
    index: HashMap<OutboxEventId, usize>,
}

impl Envelopes {
    fn push(&mut self, envelope: OutboxEvent) {
        self.index.insert(envelope.id(), self.rows.len());
        self.rows.push(envelope);
    }

    fn get_mut(&mut self, id: OutboxEventId) -> Result<&mut OutboxEvent, OutboxError> {
        let pos = *self.index.get(&id).ok_or(OutboxError::NotFound(id))?;
        Ok(&mut self.rows[pos])
    }
}

/// Process-local outbox store
///
/// Clones share the same underlying envelopes.
#[derive(Debug, Clone)]
pub struct InMemoryOutboxRepository {
    envelopes: Arc<RwLock<Envelopes>>,
    clock: SharedClock,
}

impl Default for InMemoryOutboxRepository {
    fn default() -> Self {
        Self::with_clock(SystemClock::shared())
    }
}

impl InMemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that reads the current time from `clock`
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            envelopes: Arc::default(),
            clock,
        }
    }

    /// Starts a unit of work whose saves become visible only on commit
    pub fn begin(&self) -> OutboxUnitOfWork {
        OutboxUnitOfWork {
            store: self.clone(),
            staged: Vec::new(),
        }
    }

    /// Number of stored envelopes in any status
    pub async fn len(&self) -> usize {
        self.envelopes.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl DomainPort for InMemoryOutboxRepository {}

#[async_trait]
impl HealthCheckable for InMemoryOutboxRepository {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("in-memory-outbox")
    }
}

#[async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    async fn save(&self, event: CanonicalEvent) -> Result<OutboxEvent, OutboxError> {
        let envelope = OutboxEvent::new(event, self.clock.now());
        self.envelopes.write().await.push(envelope.clone());
        debug!(id = %envelope.id(), "Saved outbox event");
        Ok(envelope)
    }

    async fn get_pending_events(&self, limit: Option<u32>) -> Result<Vec<OutboxEvent>, OutboxError> {
        let limit = resolve_limit(limit)? as usize;
        let now = self.clock.now();
        let envelopes = self.envelopes.read().await;
        Ok(envelopes
            .rows
            .iter()
            .filter(|e| e.is_claimable(now))
            .take(limit)
            .map(|e| {
                // Expired leases are reported as released; the stored row is untouched
                let mut view = e.clone();
                view.release_if_expired(now);
                view
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn claim_pending(
        &self,
        worker_id: &str,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        let limit = resolve_limit(Some(limit))? as usize;
        let now = self.clock.now();
        let mut envelopes = self.envelopes.write().await;

        let mut claimed = Vec::new();
        for envelope in envelopes.rows.iter_mut() {
            if claimed.len() == limit {
                break;
            }
            if envelope.is_claimable(now) {
                envelope.claim(worker_id, lease, now)?;
                claimed.push(envelope.clone());
            }
        }

        if !claimed.is_empty() {
            info!(count = claimed.len(), "Claimed outbox events");
        }
        Ok(claimed)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn mark_as_processed(&self, id: OutboxEventId) -> Result<(), OutboxError> {
        let now = self.clock.now();
        let mut envelopes = self.envelopes.write().await;
        let transition = envelopes.get_mut(id)?.mark_sent(now)?;
        debug!(?transition, "Marked outbox event as sent");
        Ok(())
    }

    #[instrument(skip(self, error), fields(id = %id))]
    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError> {
        let now = self.clock.now();
        let mut envelopes = self.envelopes.write().await;
        let envelope = envelopes.get_mut(id)?;
        envelope.mark_failed(error, now)?;
        debug!(attempts = envelope.attempts(), "Marked outbox event as failed");
        Ok(())
    }

    async fn get_event(&self, id: OutboxEventId) -> Result<OutboxEvent, OutboxError> {
        let envelopes = self.envelopes.read().await;
        envelopes
            .index
            .get(&id)
            .map(|&pos| envelopes.rows[pos].clone())
            .ok_or(OutboxError::NotFound(id))
    }

    async fn release_expired_leases(&self) -> Result<u64, OutboxError> {
        let now = self.clock.now();
        let mut envelopes = self.envelopes.write().await;
        let released = envelopes
            .rows
            .iter_mut()
            .map(|e| e.release_if_expired(now))
            .filter(Transition::is_applied)
            .count() as u64;
        if released > 0 {
            info!(released, "Released expired outbox leases");
        }
        Ok(released)
    }

    async fn requeue_failed(&self, policy: &RetryPolicy) -> Result<u64, OutboxError> {
        let now = self.clock.now();
        let mut envelopes = self.envelopes.write().await;
        let requeued = envelopes
            .rows
            .iter_mut()
            .map(|e| e.requeue_if_due(policy, now))
            .filter(Transition::is_applied)
            .count() as u64;
        if requeued > 0 {
            info!(requeued, "Requeued failed outbox events");
        }
        Ok(requeued)
    }

    async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        let envelopes = self.envelopes.read().await;
        Ok(envelopes.rows.iter().map(OutboxEvent::status).collect())
    }
}

/// Staged outbox writes that are appended together on [`commit`](Self::commit)
///
/// Dropping a unit of work without committing discards everything staged.
#[derive(Debug)]
pub struct OutboxUnitOfWork {
    store: InMemoryOutboxRepository,
    staged: Vec<OutboxEvent>,
}

impl OutboxUnitOfWork {
    /// Stages a new `PENDING` envelope; it is not visible until commit
    pub fn save(&mut self, event: CanonicalEvent) -> OutboxEvent {
        let envelope = OutboxEvent::new(event, self.store.clock.now());
        self.staged.push(envelope.clone());
        envelope
    }

    pub fn staged(&self) -> &[OutboxEvent] {
        &self.staged
    }

    /// Appends every staged envelope in staging order under a single write lock
    pub async fn commit(mut self) -> Result<Vec<OutboxEventId>, OutboxError> {
        let staged = std::mem::take(&mut self.staged);
        let ids = staged.iter().map(OutboxEvent::id).collect();
        let mut envelopes = self.store.envelopes.write().await;
        for envelope in staged {
            envelopes.push(envelope);
        }
        Ok(ids)
    }

    /// Discards every staged envelope
    pub fn rollback(mut self) {
        self.staged.clear();
    }
}

impl Drop for OutboxUnitOfWork {
    fn drop(&mut self) {
        if !self.staged.is_empty() {
            debug!(count = self.staged.len(), "Discarding uncommitted outbox events");
        }
    }
}
