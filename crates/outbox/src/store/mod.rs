//! Outbox persistence.
//!
//! Every worker transition is conditioned on the record still being
//! `processing` under the caller's lock. When that condition fails the record
//! was reclaimed in the meantime and the call returns [`AppError::LockLost`].

mod memory;
mod postgres;

pub use memory::MemoryOutboxStore;
pub use postgres::PgOutboxStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{
    AuditEvent, AuditEventType, Channel, DeliveryStatus, NotificationRecord, NotificationStatus,
};

/// A record as written by the enqueue path.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: Uuid,
    pub channel: Channel,
    pub destination: String,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template_key: Option<String>,
    pub message_text: Option<String>,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
}

/// An audit row before it is stamped with an id and time.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub event_type: AuditEventType,
    pub notification_id: Uuid,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

impl NewAuditEvent {
    pub fn for_record(
        event_type: AuditEventType,
        record: &NotificationRecord,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            notification_id: record.id,
            user_id: record.user_id,
            league_id: record.league_id,
            payload,
        }
    }

    pub(crate) fn into_event(self, created_at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            event_type: self.event_type,
            notification_id: self.notification_id,
            user_id: self.user_id,
            league_id: self.league_id,
            payload: self.payload,
            created_at,
        }
    }
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert a record and its first audit event as one unit.
    async fn insert_with_audit(
        &self,
        notification: NewNotification,
        audit: NewAuditEvent,
    ) -> Result<NotificationRecord, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, AppError>;

    /// Atomically move up to `batch_size` due records to `processing` under
    /// `worker_id`, oldest `next_attempt_at` first. Concurrent callers receive
    /// disjoint sets.
    async fn claim_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<NotificationRecord>, AppError>;

    /// Fill in a destination that was empty at claim time.
    async fn set_destination(
        &self,
        id: Uuid,
        worker_id: &str,
        destination: &str,
    ) -> Result<(), AppError>;

    /// `processing` → `sent`, counting the attempt.
    async fn mark_sent(
        &self,
        id: Uuid,
        worker_id: &str,
        provider: &str,
        provider_message_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// `processing` → `retry_scheduled`, counting the attempt.
    async fn schedule_retry(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// `processing` → `failed`, counting the attempt.
    async fn mark_failed(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Reset `processing` records locked before `locked_before` to
    /// `retry_scheduled`, due at `now`. Returns the reset records.
    async fn reclaim_stale(
        &self,
        locked_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AppError>;

    /// Set `delivery_status` on the record(s) carrying this provider message id.
    /// Returns the number of records updated.
    async fn record_delivery_status(
        &self,
        provider: &str,
        provider_message_id: &str,
        status: DeliveryStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError>;

    async fn append_audit(&self, event: NewAuditEvent) -> Result<(), AppError>;

    /// Audit history of one record, oldest first.
    async fn audit_for(&self, notification_id: Uuid) -> Result<Vec<AuditEvent>, AppError>;
}
