//! In-memory outbox store for tests and local development.
//!
//! All state sits behind one mutex, so a claim is atomic with respect to
//! every other call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{AuditEvent, DeliveryStatus, NotificationRecord, NotificationStatus};

use super::{NewAuditEvent, NewNotification, OutboxStore};

#[derive(Default)]
struct State {
    records: HashMap<Uuid, NotificationRecord>,
    audit: Vec<AuditEvent>,
}

#[derive(Default)]
pub struct MemoryOutboxStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert or replace a record directly, bypassing the enqueue path.
    pub async fn put(&self, record: NotificationRecord) {
        self.state.lock().await.records.insert(record.id, record);
    }

    /// Every record, oldest first.
    pub async fn snapshot(&self) -> Vec<NotificationRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<NotificationRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        records
    }

    /// Every audit event, in insertion order.
    pub async fn audit_log(&self) -> Vec<AuditEvent> {
        self.state.lock().await.audit.clone()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// Apply `update` to a record only while `worker_id` holds its lock.
    async fn with_lock<F>(&self, id: Uuid, worker_id: &str, update: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut NotificationRecord) -> bool + Send,
    {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(&id)
            .filter(|r| {
                r.status == NotificationStatus::Processing
                    && r.locked_by.as_deref() == Some(worker_id)
            })
            .ok_or(AppError::LockLost(id))?;

        if !update(record) {
            return Err(AppError::LockLost(id));
        }
        record.updated_at = Utc::now();
        Ok(())
    }
}

fn release(record: &mut NotificationRecord, status: NotificationStatus, now: DateTime<Utc>) {
    record.status = status;
    record.attempt_count += 1;
    record.last_attempt_at = Some(now);
    record.locked_at = None;
    record.locked_by = None;
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn insert_with_audit(
        &self,
        notification: NewNotification,
        audit: NewAuditEvent,
    ) -> Result<NotificationRecord, AppError> {
        self.check_available()?;
        let now = Utc::now();
        let record = NotificationRecord {
            id: notification.id,
            channel: notification.channel,
            destination: notification.destination,
            user_id: notification.user_id,
            league_id: notification.league_id,
            team_id: notification.team_id,
            template_key: notification.template_key,
            message_text: notification.message_text,
            payload: notification.payload,
            status: notification.status,
            attempt_count: 0,
            last_error: notification.last_error,
            next_attempt_at: notification.next_attempt_at,
            last_attempt_at: None,
            locked_at: None,
            locked_by: None,
            provider: None,
            provider_message_id: None,
            sent_at: None,
            delivery_status: None,
            provider_delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.lock().await;
        if state.records.contains_key(&record.id) {
            return Err(AppError::InvalidRequest(format!(
                "notification {} already exists",
                record.id
            )));
        }
        state.records.insert(record.id, record.clone());
        state.audit.push(audit.into_event(now));

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, AppError> {
        self.check_available()?;
        Ok(self.state.lock().await.records.get(&id).cloned())
    }

    async fn claim_due(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = state
            .records
            .values()
            .filter(|r| r.status.is_claimable() && r.next_attempt_at <= now)
            .map(|r| (r.next_attempt_at, r.id))
            .collect();
        due.sort();
        due.truncate(batch_size as usize);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(record) = state.records.get_mut(&id) {
                record.status = NotificationStatus::Processing;
                record.locked_at = Some(now);
                record.locked_by = Some(worker_id.to_string());
                record.updated_at = Utc::now();
                claimed.push(record.clone());
            }
        }

        Ok(claimed)
    }

    async fn set_destination(
        &self,
        id: Uuid,
        worker_id: &str,
        destination: &str,
    ) -> Result<(), AppError> {
        let destination = destination.to_string();
        self.with_lock(id, worker_id, move |record| {
            if !record.destination.is_empty() {
                return false;
            }
            record.destination = destination;
            true
        })
        .await
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        worker_id: &str,
        provider: &str,
        provider_message_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let provider = provider.to_string();
        let provider_message_id = provider_message_id.map(str::to_string);
        self.with_lock(id, worker_id, move |record| {
            release(record, NotificationStatus::Sent, now);
            record.sent_at = Some(now);
            record.provider = Some(provider);
            record.provider_message_id = provider_message_id;
            record.last_error = None;
            true
        })
        .await
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let error = error.to_string();
        self.with_lock(id, worker_id, move |record| {
            release(record, NotificationStatus::RetryScheduled, now);
            record.last_error = Some(error);
            record.next_attempt_at = next_attempt_at;
            true
        })
        .await
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        worker_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let error = error.to_string();
        self.with_lock(id, worker_id, move |record| {
            release(record, NotificationStatus::Failed, now);
            record.last_error = Some(error);
            true
        })
        .await
    }

    async fn reclaim_stale(
        &self,
        locked_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let mut reclaimed = Vec::new();
        for record in state.records.values_mut() {
            let stale = record.status == NotificationStatus::Processing
                && record.locked_at.is_some_and(|at| at < locked_before);
            if !stale {
                continue;
            }
            record.status = NotificationStatus::RetryScheduled;
            record.next_attempt_at = now;
            record.last_error = Some("processing lock expired".to_string());
            record.locked_at = None;
            record.locked_by = None;
            record.updated_at = Utc::now();
            reclaimed.push(record.clone());
        }

        Ok(reclaimed)
    }

    async fn record_delivery_status(
        &self,
        provider: &str,
        provider_message_id: &str,
        status: DeliveryStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        self.check_available()?;
        let mut state = self.state.lock().await;

        let mut updated = 0;
        for record in state.records.values_mut() {
            if record.provider.as_deref() == Some(provider)
                && record.provider_message_id.as_deref() == Some(provider_message_id)
            {
                record.delivery_status = Some(status);
                if delivered_at.is_some() {
                    record.provider_delivered_at = delivered_at;
                }
                record.updated_at = Utc::now();
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<(), AppError> {
        self.check_available()?;
        self.state.lock().await.audit.push(event.into_event(Utc::now()));
        Ok(())
    }

    async fn audit_for(&self, notification_id: Uuid) -> Result<Vec<AuditEvent>, AppError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .await
            .audit
            .iter()
            .filter(|e| e.notification_id == notification_id)
            .cloned()
            .collect())
    }
}
