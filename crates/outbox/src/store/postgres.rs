//! Postgres outbox store.
//!
//! The claim is a single `UPDATE ... FROM (SELECT ... FOR UPDATE SKIP LOCKED)`
//! statement: rows another worker is claiming are skipped rather than waited
//! on, and a row whose status changed before the lock was taken no longer
//! matches the subquery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{AuditEvent, DeliveryStatus, NotificationRecord};

use super::{NewAuditEvent, NewNotification, OutboxStore};

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_audit_in(
        tx: &mut Transaction<'_, Postgres>,
        event: AuditEvent,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, event_type, notification_id, user_id, league_id, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(event.event_type.as_str())
        .bind(event.notification_id)
        .bind(event.user_id)
        .bind(event.league_id)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    fn require_lock(id: Uuid, rows_affected: u64) -> Result<(), AppError> {
        if rows_affected == 0 {
            return Err(AppError::LockLost(id));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn insert_with_audit(
        &self,
        notification: NewNotification,
        audit: NewAuditEvent,
    ) -> Result<NotificationRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        let record: NotificationRecord = sqlx::query_as(
            r#"
            INSERT INTO notifications_outbox (
                id, channel, destination, user_id, league_id, team_id,
                template_key, message_text, payload, status, last_error, next_attempt_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(notification.channel.as_str())
        .bind(&notification.destination)
        .bind(notification.user_id)
        .bind(notification.league_id)
        .bind(notification.team_id)
        .bind(&notification.template_key)
        .bind(&notification.message_text)
        .bind(&notification.payload)
        .bind(notification.status.as_str())
        .bind(&notification.last_error)
        .bind(notification.next_attempt_at)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit_in(&mut tx, audit.into_event(Utc::now())).await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, AppError> {
        let record = sqlx::query_as("SELECT * FROM notifications_outbox WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn claim_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let mut claimed: Vec<NotificationRecord> = sqlx::query_as(
            r#"
            UPDATE notifications_outbox AS n
            SET status = 'processing',
                locked_at = $1,
                locked_by = $3,
                updated_at = NOW()
            FROM (
                SELECT id
                FROM notifications_outbox
                WHERE status IN ('pending', 'retry_scheduled')
                  AND next_attempt_at <= $1
                ORDER BY next_attempt_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) AS due
            WHERE n.id = due.id
              AND n.status IN ('pending', 'retry_scheduled')
            RETURNING n.*
            "#,
        )
        .bind(now)
        .bind(i64::from(batch_size))
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING does not preserve the subquery order.
        claimed.sort_by_key(|r| r.next_attempt_at);
        Ok(claimed)
    }

    async fn set_destination(
        &self,
        id: Uuid,
        worker_id: &str,
        destination: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications_outbox
            SET destination = $3, updated_at = NOW()
            WHERE id = $1
              AND status = 'processing'
              AND locked_by = $2
              AND destination = ''
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(destination)
        .execute(&self.pool)
        .await?;

        Self::require_lock(id, result.rows_affected())
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        worker_id: &str,
        provider: &str,
        provider_message_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications_outbox
            SET status = 'sent',
                attempt_count = attempt_count + 1,
                sent_at = $3,
                last_attempt_at = $3,
                provider = $4,
                provider_message_id = $5,
                last_error = NULL,
                locked_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND locked_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(now)
        .bind(provider)
        .bind(provider_message_id)
        .execute(&self.pool)
        .await?;

        Self::require_lock(id, result.rows_affected())
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications_outbox
            SET status = 'retry_scheduled',
                attempt_count = attempt_count + 1,
                last_attempt_at = $3,
                last_error = $4,
                next_attempt_at = $5,
                locked_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND locked_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(now)
        .bind(error)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        Self::require_lock(id, result.rows_affected())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications_outbox
            SET status = 'failed',
                attempt_count = attempt_count + 1,
                last_attempt_at = $3,
                last_error = $4,
                locked_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing' AND locked_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(now)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Self::require_lock(id, result.rows_affected())
    }

    async fn reclaim_stale(
        &self,
        locked_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let reclaimed: Vec<NotificationRecord> = sqlx::query_as(
            r#"
            UPDATE notifications_outbox
            SET status = 'retry_scheduled',
                next_attempt_at = $2,
                last_error = 'processing lock expired',
                locked_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE status = 'processing'
              AND locked_at < $1
            RETURNING *
            "#,
        )
        .bind(locked_before)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(reclaimed)
    }

    async fn record_delivery_status(
        &self,
        provider: &str,
        provider_message_id: &str,
        status: DeliveryStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications_outbox
            SET delivery_status = $3,
                provider_delivered_at = COALESCE($4, provider_delivered_at),
                updated_at = NOW()
            WHERE provider = $1 AND provider_message_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_message_id)
        .bind(status.as_str())
        .bind(delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_audit_in(&mut tx, event.into_event(Utc::now())).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn audit_for(&self, notification_id: Uuid) -> Result<Vec<AuditEvent>, AppError> {
        let events: Vec<AuditEvent> = sqlx::query_as(
            r#"
            SELECT id, event_type, notification_id, user_id, league_id, payload, created_at
            FROM audit_events
            WHERE notification_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(notification_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
