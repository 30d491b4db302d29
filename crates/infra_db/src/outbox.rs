//! PostgreSQL outbox repository
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent dispatchers partition the
//! pending rows between them instead of blocking on each other. Single-envelope
//! status changes lock the row, apply the shared transition rules from
//! `domain_outbox`, and write the result back in one transaction.
//!
//! Timestamps come from the repository's clock and are truncated to
//! microseconds, the resolution of `TIMESTAMPTZ`, so a saved envelope compares
//! equal to the one read back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use core_kernel::{
    AdapterHealth, Clock, DomainPort, HealthCheckResult, HealthCheckable, OutboxEventId,
    SharedClock, SystemClock,
};
use domain_commerce::CanonicalEvent;
use domain_outbox::{
    lease_deadline, resolve_limit, OutboxError, OutboxEvent, OutboxRepository, OutboxStats,
    OutboxStatus, RetryPolicy,
};

use crate::error::DatabaseError;
use crate::rows::{into_envelopes, DbOutboxStatus, OutboxRow};

macro_rules! select_outbox {
    ($tail:literal) => {
        concat!(
            "SELECT seq, id, payload, status, attempts, created_at, last_attempt, error, ",
            "claimed_by, lease_expires_at FROM outbox_events ",
            $tail
        )
    };
}

/// Outbox store backed by the `outbox_events` table
#[derive(Debug, Clone)]
pub struct PostgresOutboxRepository {
    pool: PgPool,
    clock: SharedClock,
}

impl PostgresOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, SystemClock::shared())
    }

    pub fn with_clock(pool: PgPool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// Saves an envelope on the caller's connection
    ///
    /// Pass the connection of an open transaction to make the outbox write
    /// commit or roll back together with the producer's own changes:
    ///
    /// ```rust,ignore
    /// let mut tx = pool.begin().await?;
    /// sqlx::query("UPDATE orders SET status = 'paid' WHERE id = $1")
    ///     .bind(order_id)
    ///     .execute(&mut *tx)
    ///     .await?;
    /// outbox.save_in(&mut tx, event).await?;
    /// tx.commit().await?;
    /// ```
    #[instrument(skip(self, conn, event), fields(event_type = %event.event_type))]
    pub async fn save_in(
        &self,
        conn: &mut PgConnection,
        event: CanonicalEvent,
    ) -> Result<OutboxEvent, OutboxError> {
        let envelope = OutboxEvent::new(event, self.now());

        sqlx::query(
            r#"
            INSERT INTO outbox_events
                (id, event_type, tenant_id, payload, status, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            "#,
        )
        .bind(*envelope.id().as_uuid())
        .bind(envelope.event_type())
        .bind(*envelope.tenant_id().as_uuid())
        .bind(Json(envelope.event()))
        .bind(DbOutboxStatus::Pending)
        .bind(envelope.created_at())
        .execute(conn)
        .await
        .map_err(DatabaseError::from)?;

        debug!(id = %envelope.id(), "Saved outbox event");
        Ok(envelope)
    }

    /// Locks one envelope, applies `change`, and writes it back if it changed
    async fn update_one<F>(&self, id: OutboxEventId, change: F) -> Result<OutboxEvent, OutboxError>
    where
        F: FnOnce(&mut OutboxEvent, DateTime<Utc>) -> Result<bool, OutboxError> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let row: Option<OutboxRow> = sqlx::query_as(select_outbox!("WHERE id = $1 FOR UPDATE"))
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;
        let mut envelope = OutboxEvent::try_from(row.ok_or(OutboxError::NotFound(id))?)?;

        if change(&mut envelope, self.now())? {
            write_back(&mut tx, &envelope).await?;
        }
        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(envelope)
    }
}

async fn write_back(conn: &mut PgConnection, envelope: &OutboxEvent) -> Result<(), DatabaseError> {
    let attempts = i32::try_from(envelope.attempts()).unwrap_or(i32::MAX);
    sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = $2,
            attempts = $3,
            last_attempt = $4,
            error = $5,
            claimed_by = $6,
            lease_expires_at = $7
        WHERE id = $1
        "#,
    )
    .bind(*envelope.id().as_uuid())
    .bind(DbOutboxStatus::from(envelope.status()))
    .bind(attempts)
    .bind(envelope.last_attempt())
    .bind(envelope.error())
    .bind(envelope.claimed_by())
    .bind(envelope.lease_expires_at())
    .execute(conn)
    .await?;
    Ok(())
}

impl DomainPort for PostgresOutboxRepository {}

#[async_trait]
impl HealthCheckable for PostgresOutboxRepository {
    async fn health_check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let probe = sqlx::query("SELECT 1").execute(&self.pool).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (status, message) = match probe {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(e.to_string())),
        };
        HealthCheckResult {
            adapter_id: "postgres-outbox".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn save(&self, event: CanonicalEvent) -> Result<OutboxEvent, OutboxError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        self.save_in(&mut conn, event).await
    }

    #[instrument(skip(self))]
    async fn get_pending_events(&self, limit: Option<u32>) -> Result<Vec<OutboxEvent>, OutboxError> {
        let limit = resolve_limit(limit)?;
        let now = self.now();
        let rows: Vec<OutboxRow> = sqlx::query_as(select_outbox!(
            "WHERE status = 'PENDING' \
                OR (status = 'IN_PROGRESS' \
                    AND (lease_expires_at IS NULL OR lease_expires_at <= $1)) \
             ORDER BY seq LIMIT $2"
        ))
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        debug!(count = rows.len(), "Fetched pending outbox events");
        let mut envelopes = into_envelopes(rows)?;
        for envelope in &mut envelopes {
            envelope.release_if_expired(now);
        }
        Ok(envelopes)
    }

    #[instrument(skip(self))]
    async fn claim_pending(
        &self,
        worker_id: &str,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxEvent>, OutboxError> {
        let limit = resolve_limit(Some(limit))?;
        let now = self.now();
        let deadline = lease_deadline(now, lease).trunc_subsecs(6);

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            WITH candidates AS (
                SELECT seq
                FROM outbox_events
                WHERE status = 'PENDING'
                   OR (status = 'IN_PROGRESS'
                       AND (lease_expires_at IS NULL OR lease_expires_at <= $1))
                ORDER BY seq
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_events
            SET status = 'IN_PROGRESS',
                claimed_by = $3,
                lease_expires_at = $4,
                last_attempt = $1
            WHERE seq IN (SELECT seq FROM candidates)
            RETURNING seq, id, payload, status, attempts, created_at, last_attempt, error,
                      claimed_by, lease_expires_at
            "#,
        )
        .bind(now)
        .bind(i64::from(limit))
        .bind(worker_id)
        .bind(deadline)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if !rows.is_empty() {
            info!(count = rows.len(), "Claimed outbox events");
        }
        Ok(into_envelopes(rows)?)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn mark_as_processed(&self, id: OutboxEventId) -> Result<(), OutboxError> {
        let envelope = self
            .update_one(id, |envelope, now| Ok(envelope.mark_sent(now)?.is_applied()))
            .await?;
        debug!(status = %envelope.status(), "Marked outbox event as sent");
        Ok(())
    }

    #[instrument(skip(self, error), fields(id = %id))]
    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError> {
        let envelope = self
            .update_one(id, |envelope, now| {
                Ok(envelope.mark_failed(error, now)?.is_applied())
            })
            .await?;
        debug!(attempts = envelope.attempts(), "Marked outbox event as failed");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get_event(&self, id: OutboxEventId) -> Result<OutboxEvent, OutboxError> {
        let row: Option<OutboxRow> = sqlx::query_as(select_outbox!("WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        let row = row.ok_or(OutboxError::NotFound(id))?;
        Ok(OutboxEvent::try_from(row)?)
    }

    #[instrument(skip(self))]
    async fn release_expired_leases(&self) -> Result<u64, OutboxError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PENDING',
                claimed_by = NULL,
                lease_expires_at = NULL,
                last_attempt = $1
            WHERE status = 'IN_PROGRESS'
              AND (lease_expires_at IS NULL OR lease_expires_at <= $1)
            "#,
        )
        .bind(self.now())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let released = result.rows_affected();
        if released > 0 {
            info!(released, "Released expired outbox leases");
        }
        Ok(released)
    }

    #[instrument(skip(self))]
    async fn requeue_failed(&self, policy: &RetryPolicy) -> Result<u64, OutboxError> {
        let max_attempts = i32::try_from(policy.max_attempts).unwrap_or(i32::MAX);
        let base_ms = policy.base_delay.as_secs_f64() * 1000.0;
        let max_ms = policy.max_delay.as_secs_f64() * 1000.0;

        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PENDING',
                error = NULL,
                last_attempt = $1
            WHERE status = 'FAILED'
              AND attempts < $2
              AND (
                  last_attempt IS NULL
                  OR last_attempt
                     + LEAST($3 * power(2.0::float8, GREATEST(attempts - 1, 0)), $4)
                       * interval '1 millisecond'
                     <= $1
              )
            "#,
        )
        .bind(self.now())
        .bind(max_attempts)
        .bind(base_ms)
        .bind(max_ms)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        let requeued = result.rows_affected();
        if requeued > 0 {
            info!(requeued, "Requeued failed outbox events");
        }
        Ok(requeued)
    }

    async fn stats(&self) -> Result<OutboxStats, OutboxError> {
        let counts: Vec<(DbOutboxStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM outbox_events GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::from)?;

        let mut stats = OutboxStats::default();
        for (status, count) in counts {
            let count = u64::try_from(count).unwrap_or(0);
            match OutboxStatus::from(status) {
                OutboxStatus::Pending => stats.pending = count,
                OutboxStatus::InProgress => stats.in_progress = count,
                OutboxStatus::Sent => stats.sent = count,
                OutboxStatus::Failed => stats.failed = count,
            }
        }
        Ok(stats)
    }
}
