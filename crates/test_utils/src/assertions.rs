//! Custom Test Assertions
//!
//! Assertion helpers for outbox envelopes that print the whole envelope on
//! failure instead of a single mismatched field.

use std::collections::HashSet;

use core_kernel::OutboxEventId;
use domain_outbox::{OutboxEvent, OutboxStatus};

/// Asserts that an envelope is in `expected` status
pub fn assert_status(envelope: &OutboxEvent, expected: OutboxStatus) {
    assert_eq!(
        envelope.status(),
        expected,
        "Expected {} envelope, got {:?}",
        expected,
        envelope
    );
}

/// Asserts the state of a freshly saved envelope
pub fn assert_fresh(envelope: &OutboxEvent) {
    assert_status(envelope, OutboxStatus::Pending);
    assert_eq!(envelope.attempts(), 0, "Fresh envelope has attempts: {:?}", envelope);
    assert!(envelope.error().is_none(), "Fresh envelope has an error: {:?}", envelope);
    assert!(envelope.last_attempt().is_none(), "Fresh envelope was attempted: {:?}", envelope);
    assert!(envelope.claimed_by().is_none(), "Fresh envelope is claimed: {:?}", envelope);
}

/// Asserts an envelope is leased to `worker_id`
pub fn assert_claimed_by(envelope: &OutboxEvent, worker_id: &str) {
    assert_status(envelope, OutboxStatus::InProgress);
    assert_eq!(envelope.claimed_by(), Some(worker_id), "Wrong lease holder: {:?}", envelope);
    assert!(
        envelope.lease_expires_at().is_some(),
        "Claimed envelope has no lease deadline: {:?}",
        envelope
    );
}

/// Asserts that envelopes appear in exactly the given id order
pub fn assert_ids_in_order(envelopes: &[OutboxEvent], expected: &[OutboxEventId]) {
    let actual: Vec<OutboxEventId> = envelopes.iter().map(OutboxEvent::id).collect();
    assert_eq!(actual, expected, "Envelope order mismatch");
}

/// Asserts that no id appears twice across all batches
pub fn assert_disjoint(batches: &[Vec<OutboxEvent>]) {
    let mut seen = HashSet::new();
    for envelope in batches.iter().flatten() {
        assert!(
            seen.insert(envelope.id()),
            "Envelope {} handed out more than once",
            envelope.id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::CanonicalEventBuilder;
    use chrono::Utc;

    #[test]
    fn test_fresh_envelope_passes() {
        assert_fresh(&OutboxEvent::new(CanonicalEventBuilder::new().build(), Utc::now()));
    }

    #[test]
    #[should_panic(expected = "handed out more than once")]
    fn test_disjoint_detects_duplicates() {
        let envelope = OutboxEvent::new(CanonicalEventBuilder::new().build(), Utc::now());
        assert_disjoint(&[vec![envelope.clone()], vec![envelope]]);
    }
}
