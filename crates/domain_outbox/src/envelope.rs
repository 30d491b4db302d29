//! Outbox envelope and its status lifecycle
//!
//! Every store applies status changes through the methods on [`OutboxEvent`],
//! so the in-memory and PostgreSQL stores accept and reject exactly the same
//! transitions. Each method takes the current time explicitly; stores supply it
//! from their [`Clock`](core_kernel::Clock).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{OutboxEventId, TenantId};
use domain_commerce::CanonicalEvent;

use crate::error::OutboxError;
use crate::retry::RetryPolicy;

/// Delivery status of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Awaiting delivery
    Pending,
    /// Claimed by a dispatcher under a lease
    InProgress,
    /// Delivered; terminal
    Sent,
    /// Last delivery attempt failed
    Failed,
}

impl OutboxStatus {
    pub const ALL: [OutboxStatus; 4] = [
        OutboxStatus::Pending,
        OutboxStatus::InProgress,
        OutboxStatus::Sent,
        OutboxStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::InProgress => "IN_PROGRESS",
            OutboxStatus::Sent => "SENT",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutboxStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown outbox status: {s}"))
    }
}

/// Outcome of an idempotent status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The envelope changed and must be written back
    Applied,
    /// The envelope was already in the requested state
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Persisted field values of an envelope, used by stores to rebuild one
#[derive(Debug, Clone)]
pub struct OutboxEventParts {
    pub id: OutboxEventId,
    pub event: CanonicalEvent,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
}

/// A canonical event wrapped with delivery bookkeeping
///
/// Invariants maintained by the transition methods:
/// - `attempts` only grows, by exactly one per failure
/// - `error` is present only while `FAILED`
/// - `claimed_by` and `lease_expires_at` are present only while `IN_PROGRESS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    id: OutboxEventId,
    event: CanonicalEvent,
    status: OutboxStatus,
    attempts: u32,
    created_at: DateTime<Utc>,
    last_attempt: Option<DateTime<Utc>>,
    error: Option<String>,
    claimed_by: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Wraps a canonical event in a fresh `PENDING` envelope
    pub fn new(event: CanonicalEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: OutboxEventId::generate(),
            event,
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: now,
            last_attempt: None,
            error: None,
            claimed_by: None,
            lease_expires_at: None,
        }
    }

    /// Rebuilds an envelope from stored values
    pub fn from_parts(parts: OutboxEventParts) -> Self {
        Self {
            id: parts.id,
            event: parts.event,
            status: parts.status,
            attempts: parts.attempts,
            created_at: parts.created_at,
            last_attempt: parts.last_attempt,
            error: parts.error,
            claimed_by: parts.claimed_by,
            lease_expires_at: parts.lease_expires_at,
        }
    }

    pub fn into_parts(self) -> OutboxEventParts {
        OutboxEventParts {
            id: self.id,
            event: self.event,
            status: self.status,
            attempts: self.attempts,
            created_at: self.created_at,
            last_attempt: self.last_attempt,
            error: self.error,
            claimed_by: self.claimed_by,
            lease_expires_at: self.lease_expires_at,
        }
    }

    pub fn id(&self) -> OutboxEventId {
        self.id
    }

    pub fn event(&self) -> &CanonicalEvent {
        &self.event
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn tenant_id(&self) -> TenantId {
        self.event.tenant_id()
    }

    pub fn status(&self) -> OutboxStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn claimed_by(&self) -> Option<&str> {
        self.claimed_by.as_deref()
    }

    pub fn lease_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lease_expires_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    /// True if the envelope is `IN_PROGRESS` and its lease ran out at or before `now`
    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::InProgress
            && self.lease_expires_at.map_or(true, |deadline| deadline <= now)
    }

    /// True if a dispatcher may claim this envelope at `now`
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() || self.is_lease_expired(now)
    }

    /// Moves the envelope to `IN_PROGRESS` under a lease held by `worker_id`
    pub fn claim(&mut self, worker_id: &str, lease: Duration, now: DateTime<Utc>) -> Result<(), OutboxError> {
        if !self.is_claimable(now) {
            return Err(self.conflict());
        }
        self.status = OutboxStatus::InProgress;
        self.claimed_by = Some(worker_id.to_string());
        self.lease_expires_at = Some(lease_deadline(now, lease));
        self.last_attempt = Some(now);
        Ok(())
    }

    /// Marks the envelope delivered
    ///
    /// Repeating the call on a `SENT` envelope is a no-op. A `FAILED` envelope
    /// must be requeued before it can be delivered.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> Result<Transition, OutboxError> {
        match self.status {
            OutboxStatus::Sent => Ok(Transition::Unchanged),
            OutboxStatus::Failed => Err(self.conflict()),
            OutboxStatus::Pending | OutboxStatus::InProgress => {
                self.status = OutboxStatus::Sent;
                self.error = None;
                self.release();
                self.last_attempt = Some(now);
                Ok(Transition::Applied)
            }
        }
    }

    /// Records a failed delivery attempt
    pub fn mark_failed(&mut self, error: &str, now: DateTime<Utc>) -> Result<Transition, OutboxError> {
        if self.status == OutboxStatus::Sent {
            return Err(self.conflict());
        }
        self.status = OutboxStatus::Failed;
        self.attempts = self.attempts.saturating_add(1);
        self.error = Some(error.to_string());
        self.release();
        self.last_attempt = Some(now);
        Ok(Transition::Applied)
    }

    /// Returns an envelope with an expired lease to `PENDING`
    pub fn release_if_expired(&mut self, now: DateTime<Utc>) -> Transition {
        if !self.is_lease_expired(now) {
            return Transition::Unchanged;
        }
        self.status = OutboxStatus::Pending;
        self.release();
        self.last_attempt = Some(now);
        Transition::Applied
    }

    /// Returns a `FAILED` envelope to `PENDING` once its backoff has elapsed
    pub fn requeue_if_due(&mut self, policy: &RetryPolicy, now: DateTime<Utc>) -> Transition {
        if self.status != OutboxStatus::Failed || !policy.is_due(self.attempts, self.last_attempt, now) {
            return Transition::Unchanged;
        }
        self.status = OutboxStatus::Pending;
        self.error = None;
        self.last_attempt = Some(now);
        Transition::Applied
    }

    fn release(&mut self) {
        self.claimed_by = None;
        self.lease_expires_at = None;
    }

    fn conflict(&self) -> OutboxError {
        OutboxError::ConcurrentModification {
            id: self.id,
            status: self.status,
        }
    }
}

/// End of a lease of length `lease` starting at `now`, saturating at the maximum timestamp
pub fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(lease)
        .ok()
        .and_then(|lease| now.checked_add_signed(lease))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{ChannelId, TenantId};
    use domain_commerce::EventMetadata;

    fn envelope() -> OutboxEvent {
        let event = CanonicalEvent::new(
            "ProductUpdated",
            serde_json::Map::new(),
            EventMetadata::new(TenantId::new(), ChannelId::new()),
        );
        OutboxEvent::new(event, Utc::now())
    }

    #[test]
    fn test_new_envelope_is_pending() {
        let env = envelope();
        assert_eq!(env.status(), OutboxStatus::Pending);
        assert_eq!(env.attempts(), 0);
        assert!(env.last_attempt().is_none());
        assert!(env.error().is_none());
    }

    #[test]
    fn test_claim_then_send() {
        let mut env = envelope();
        let now = Utc::now();

        env.claim("worker-a", Duration::from_secs(30), now).unwrap();
        assert_eq!(env.status(), OutboxStatus::InProgress);
        assert_eq!(env.claimed_by(), Some("worker-a"));
        assert_eq!(env.lease_expires_at(), Some(now + chrono::Duration::seconds(30)));

        assert_eq!(env.mark_sent(now).unwrap(), Transition::Applied);
        assert_eq!(env.status(), OutboxStatus::Sent);
        assert!(env.claimed_by().is_none());
        assert!(env.lease_expires_at().is_none());
    }

    #[test]
    fn test_claim_rejected_while_lease_is_live() {
        let mut env = envelope();
        let now = Utc::now();
        env.claim("worker-a", Duration::from_secs(30), now).unwrap();

        let err = env
            .claim("worker-b", Duration::from_secs(30), now + chrono::Duration::seconds(29))
            .unwrap_err();
        assert!(matches!(
            err,
            OutboxError::ConcurrentModification { status: OutboxStatus::InProgress, .. }
        ));

        env.claim("worker-b", Duration::from_secs(30), now + chrono::Duration::seconds(30))
            .unwrap();
        assert_eq!(env.claimed_by(), Some("worker-b"));
    }

    #[test]
    fn test_mark_sent_is_idempotent() {
        let mut env = envelope();
        let now = Utc::now();
        assert_eq!(env.mark_sent(now).unwrap(), Transition::Applied);
        assert_eq!(env.mark_sent(now).unwrap(), Transition::Unchanged);
        assert_eq!(env.status(), OutboxStatus::Sent);
    }

    #[test]
    fn test_failures_accumulate() {
        let mut env = envelope();
        let now = Utc::now();

        env.mark_failed("timeout", now).unwrap();
        env.mark_failed("503 from broker", now).unwrap();

        assert_eq!(env.status(), OutboxStatus::Failed);
        assert_eq!(env.attempts(), 2);
        assert_eq!(env.error(), Some("503 from broker"));
        assert_eq!(env.last_attempt(), Some(now));
    }

    #[test]
    fn test_sent_and_failed_do_not_cross() {
        let now = Utc::now();

        let mut sent = envelope();
        sent.mark_sent(now).unwrap();
        assert!(sent.mark_failed("late failure", now).is_err());
        assert_eq!(sent.attempts(), 0);

        let mut failed = envelope();
        failed.mark_failed("boom", now).unwrap();
        assert!(failed.mark_sent(now).is_err());
        assert_eq!(failed.status(), OutboxStatus::Failed);
    }

    #[test]
    fn test_requeue_clears_error_and_keeps_attempts() {
        let mut env = envelope();
        let now = Utc::now();
        env.mark_failed("boom", now).unwrap();

        let policy = RetryPolicy::default();
        assert_eq!(env.requeue_if_due(&policy, now), Transition::Unchanged);

        let later = now + chrono::Duration::seconds(1);
        assert_eq!(env.requeue_if_due(&policy, later), Transition::Applied);
        assert_eq!(env.status(), OutboxStatus::Pending);
        assert_eq!(env.attempts(), 1);
        assert!(env.error().is_none());
    }

    #[test]
    fn test_release_only_touches_expired_leases() {
        let mut env = envelope();
        let now = Utc::now();
        env.claim("worker-a", Duration::from_secs(10), now).unwrap();

        assert_eq!(env.release_if_expired(now), Transition::Unchanged);
        assert_eq!(
            env.release_if_expired(now + chrono::Duration::seconds(10)),
            Transition::Applied
        );
        assert!(env.is_pending());
        assert!(env.claimed_by().is_none());
    }

    #[test]
    fn test_status_strings() {
        for status in OutboxStatus::ALL {
            assert_eq!(status.as_str().parse::<OutboxStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&OutboxStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert!("DONE".parse::<OutboxStatus>().is_err());
    }
}
