//! Outbox repository port
//!
//! Implemented by [`InMemoryOutboxRepository`](crate::InMemoryOutboxRepository)
//! and by `infra_db::PostgresOutboxRepository`. Both must pass the contract
//! suite in `test_utils::contract`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, OutboxEventId};
use domain_commerce::CanonicalEvent;

use crate::envelope::{OutboxEvent, OutboxStatus};
use crate::error::OutboxError;
use crate::retry::RetryPolicy;

/// Page size used by `get_pending_events(None)`
pub const DEFAULT_PENDING_LIMIT: u32 = 100;

/// Resolves an optional page size, rejecting zero
pub fn resolve_limit(limit: Option<u32>) -> Result<u32, OutboxError> {
    match limit {
        None => Ok(DEFAULT_PENDING_LIMIT),
        Some(0) => Err(OutboxError::InvalidLimit(0)),
        Some(n) => Ok(n),
    }
}

/// Number of envelopes per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub pending: u64,
    pub in_progress: u64,
    pub sent: u64,
    pub failed: u64,
}

impl OutboxStats {
    pub fn count(&self, status: OutboxStatus) -> u64 {
        match status {
            OutboxStatus::Pending => self.pending,
            OutboxStatus::InProgress => self.in_progress,
            OutboxStatus::Sent => self.sent,
            OutboxStatus::Failed => self.failed,
        }
    }

    pub(crate) fn record(&mut self, status: OutboxStatus) {
        match status {
            OutboxStatus::Pending => self.pending += 1,
            OutboxStatus::InProgress => self.in_progress += 1,
            OutboxStatus::Sent => self.sent += 1,
            OutboxStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.sent + self.failed
    }

    /// Envelopes not yet delivered
    pub fn backlog(&self) -> u64 {
        self.pending + self.in_progress + self.failed
    }
}

impl FromIterator<OutboxStatus> for OutboxStats {
    fn from_iter<I: IntoIterator<Item = OutboxStatus>>(iter: I) -> Self {
        let mut stats = OutboxStats::default();
        for status in iter {
            stats.record(status);
        }
        stats
    }
}

/// Durable store of outbox envelopes
///
/// Every operation is atomic with respect to the envelopes it touches.
/// Concurrent status changes on the same envelope are serialised, and two
/// concurrent `claim_pending` calls never hand out the same envelope.
#[async_trait]
pub trait OutboxRepository: DomainPort + HealthCheckable {
    /// Persists a new `PENDING` envelope for `event`
    async fn save(&self, event: CanonicalEvent) -> Result<OutboxEvent, OutboxError>;

    /// Returns up to `limit` (default [`DEFAULT_PENDING_LIMIT`]) `PENDING`
    /// envelopes, oldest first, without changing them
    ///
    /// `IN_PROGRESS` envelopes whose lease has expired are included and
    /// reported as `PENDING`, as they would look once released.
    async fn get_pending_events(&self, limit: Option<u32>) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Moves up to `limit` claimable envelopes to `IN_PROGRESS` under a lease
    /// held by `worker_id`, oldest first
    async fn claim_pending(
        &self,
        worker_id: &str,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Marks an envelope delivered; a no-op if it already is
    async fn mark_as_processed(&self, id: OutboxEventId) -> Result<(), OutboxError>;

    /// Records a failed delivery attempt
    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError>;

    async fn get_event(&self, id: OutboxEventId) -> Result<OutboxEvent, OutboxError>;

    /// Returns every `IN_PROGRESS` envelope whose lease expired to `PENDING`
    async fn release_expired_leases(&self) -> Result<u64, OutboxError>;

    /// Returns `FAILED` envelopes that are due under `policy` to `PENDING`
    async fn requeue_failed(&self, policy: &RetryPolicy) -> Result<u64, OutboxError>;

    async fn stats(&self) -> Result<OutboxStats, OutboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None).unwrap(), 100);
        assert_eq!(resolve_limit(Some(7)).unwrap(), 7);
        assert!(matches!(resolve_limit(Some(0)), Err(OutboxError::InvalidLimit(0))));
    }

    #[test]
    fn test_stats_from_statuses() {
        let stats: OutboxStats = [
            OutboxStatus::Pending,
            OutboxStatus::Pending,
            OutboxStatus::Sent,
            OutboxStatus::Failed,
        ]
        .into_iter()
        .collect();

        assert_eq!(stats.count(OutboxStatus::Pending), 2);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.backlog(), 3);
    }
}
