//! Row mappings for the outbox tables

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use core_kernel::OutboxEventId;
use domain_commerce::CanonicalEvent;
use domain_outbox::{OutboxEvent, OutboxEventParts, OutboxStatus};

use crate::error::DatabaseError;

/// PostgreSQL `outbox_status` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbOutboxStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
}

impl From<OutboxStatus> for DbOutboxStatus {
    fn from(status: OutboxStatus) -> Self {
        match status {
            OutboxStatus::Pending => DbOutboxStatus::Pending,
            OutboxStatus::InProgress => DbOutboxStatus::InProgress,
            OutboxStatus::Sent => DbOutboxStatus::Sent,
            OutboxStatus::Failed => DbOutboxStatus::Failed,
        }
    }
}

impl From<DbOutboxStatus> for OutboxStatus {
    fn from(status: DbOutboxStatus) -> Self {
        match status {
            DbOutboxStatus::Pending => OutboxStatus::Pending,
            DbOutboxStatus::InProgress => OutboxStatus::InProgress,
            DbOutboxStatus::Sent => OutboxStatus::Sent,
            DbOutboxStatus::Failed => OutboxStatus::Failed,
        }
    }
}

/// One row of `outbox_events`
#[derive(Debug, FromRow)]
pub struct OutboxRow {
    pub seq: i64,
    pub id: Uuid,
    pub payload: Json<CanonicalEvent>,
    pub status: DbOutboxStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub claimed_by: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = DatabaseError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let attempts = u32::try_from(row.attempts).map_err(|_| {
            DatabaseError::SerializationError(format!(
                "negative attempts {} for outbox event {}",
                row.attempts, row.id
            ))
        })?;

        Ok(OutboxEvent::from_parts(OutboxEventParts {
            id: OutboxEventId::from_uuid(row.id),
            event: row.payload.0,
            status: row.status.into(),
            attempts,
            created_at: row.created_at,
            last_attempt: row.last_attempt,
            error: row.error,
            claimed_by: row.claimed_by,
            lease_expires_at: row.lease_expires_at,
        }))
    }
}

/// Converts rows to envelopes, ordered by insertion sequence
pub fn into_envelopes(mut rows: Vec<OutboxRow>) -> Result<Vec<OutboxEvent>, DatabaseError> {
    rows.sort_by_key(|row| row.seq);
    rows.into_iter().map(OutboxEvent::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{ChannelId, TenantId};
    use domain_commerce::EventMetadata;

    fn row(seq: i64, attempts: i32) -> OutboxRow {
        OutboxRow {
            seq,
            id: Uuid::now_v7(),
            payload: Json(CanonicalEvent::new(
                "OrderCreated",
                serde_json::Map::new(),
                EventMetadata::new(TenantId::new(), ChannelId::new()),
            )),
            status: DbOutboxStatus::Failed,
            attempts,
            created_at: Utc::now(),
            last_attempt: Some(Utc::now()),
            error: Some("boom".to_string()),
            claimed_by: None,
            lease_expires_at: None,
        }
    }

    #[test]
    fn test_row_converts_to_envelope() {
        let source = row(1, 3);
        let id = source.id;
        let envelope = OutboxEvent::try_from(source).unwrap();

        assert_eq!(*envelope.id().as_uuid(), id);
        assert_eq!(envelope.status(), OutboxStatus::Failed);
        assert_eq!(envelope.attempts(), 3);
        assert_eq!(envelope.error(), Some("boom"));
    }

    #[test]
    fn test_negative_attempts_are_rejected() {
        assert!(OutboxEvent::try_from(row(1, -1)).is_err());
    }

    #[test]
    fn test_envelopes_sorted_by_seq() {
        let rows = vec![row(3, 0), row(1, 0), row(2, 0)];
        let expected: Vec<_> = {
            let mut ids: Vec<_> = rows.iter().map(|r| (r.seq, r.id)).collect();
            ids.sort();
            ids.into_iter().map(|(_, id)| id).collect()
        };

        let envelopes = into_envelopes(rows).unwrap();
        let got: Vec<_> = envelopes.iter().map(|e| *e.id().as_uuid()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_status_mapping_round_trips() {
        for status in OutboxStatus::ALL {
            assert_eq!(OutboxStatus::from(DbOutboxStatus::from(status)), status);
        }
    }
}
