//! Claim-and-dispatch worker.
//!
//! One invocation claims a batch under a fresh worker id, dispatches every
//! claimed record concurrently and applies the retry policy to each outcome.
//! Per-record failures, panics included, are contained to that record. A store
//! failure while claiming, or while recording the fallback `failed` state,
//! aborts the invocation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinSet;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{AuditEventType, NotificationRecord, mask_destination};
use draftbell_notifier::{SendOutcome, SenderRegistry};

use crate::audit::AuditTrail;
use crate::backoff::{FailureReason, RetryDecision, RetryPolicy};
use crate::classifier::classify;
use crate::resolver::{Resolution, Resolver};
use crate::settings::OutboxSettings;
use crate::store::OutboxStore;

/// Identity of one worker invocation, carried into every lock-conditioned call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        WorkerId(format!("worker-{}", &id[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counts reported by one invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub worker_id: WorkerId,
    pub claimed: usize,
    pub sent: usize,
    pub retry_scheduled: usize,
    pub failed: usize,
    /// `"<notification id>: <error>"` for every record that did not end in `sent`.
    pub errors: Vec<String>,
}

impl BatchSummary {
    fn new(worker_id: WorkerId, claimed: usize) -> Self {
        Self {
            worker_id,
            claimed,
            sent: 0,
            retry_scheduled: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    fn tally(&mut self, id: Uuid, disposition: Disposition) {
        match disposition {
            Disposition::Sent => self.sent += 1,
            Disposition::RetryScheduled { error } => {
                self.retry_scheduled += 1;
                self.errors.push(format!("{}: {}", id, error));
            }
            Disposition::Failed { error } => {
                self.failed += 1;
                self.errors.push(format!("{}: {}", id, error));
            }
            Disposition::LockLost => {
                self.errors.push(format!("{}: lock lost before completion", id));
            }
        }
    }
}

/// Where one record ended up.
#[derive(Debug)]
enum Disposition {
    Sent,
    RetryScheduled { error: String },
    Failed { error: String },
    /// The recovery sweep took the record away mid-dispatch.
    LockLost,
}

#[derive(Clone)]
pub struct OutboxWorker {
    store: Arc<dyn OutboxStore>,
    resolver: Resolver,
    senders: SenderRegistry,
    audit: AuditTrail,
    policy: RetryPolicy,
    settings: OutboxSettings,
}

impl OutboxWorker {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        resolver: Resolver,
        senders: SenderRegistry,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            audit: AuditTrail::new(Arc::clone(&store)),
            policy: RetryPolicy::new(settings.max_attempts),
            store,
            resolver,
            senders,
            settings,
        }
    }

    pub fn settings(&self) -> &OutboxSettings {
        &self.settings
    }

    /// Run one invocation at the current time.
    pub async fn run_once(&self) -> Result<BatchSummary, AppError> {
        self.run_at(Utc::now()).await
    }

    /// Run one invocation treating `now` as the current time.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<BatchSummary, AppError> {
        let worker_id = WorkerId::generate();
        let claimed = self
            .store
            .claim_due(worker_id.as_str(), now, self.settings.batch_size)
            .await?;

        let mut summary = BatchSummary::new(worker_id.clone(), claimed.len());
        if claimed.is_empty() {
            return Ok(summary);
        }

        tracing::info!(worker_id = %worker_id, claimed = claimed.len(), "Claimed outbox batch");

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, NotificationRecord> = HashMap::new();
        for record in claimed {
            let worker = self.clone();
            let task_worker_id = worker_id.clone();
            let task_record = record.clone();
            let handle = tasks.spawn(async move {
                worker.dispatch(&task_worker_id, task_record, now).await
            });
            in_flight.insert(handle.id(), record);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(join_error) => {
                    let error = if join_error.is_panic() {
                        "sender panicked".to_string()
                    } else {
                        join_error.to_string()
                    };
                    (join_error.id(), Err(AppError::Internal(error)))
                }
            };

            let Some(record) = in_flight.remove(&task_id) else {
                continue;
            };

            let disposition = match result {
                Ok(disposition) => disposition,
                Err(AppError::LockLost(_)) => Disposition::LockLost,
                Err(e) => match self.fail_unexpected(&worker_id, &record, &e, now).await {
                    Ok(disposition) => disposition,
                    Err(store_error) => {
                        tasks.abort_all();
                        tracing::error!(
                            worker_id = %worker_id,
                            notification_id = %record.id,
                            error = %store_error,
                            "Store failure while containing record error, aborting batch"
                        );
                        return Err(store_error);
                    }
                },
            };
            summary.tally(record.id, disposition);
        }

        tracing::info!(
            worker_id = %worker_id,
            claimed = summary.claimed,
            sent = summary.sent,
            retry_scheduled = summary.retry_scheduled,
            failed = summary.failed,
            "Outbox batch complete"
        );

        Ok(summary)
    }

    /// Reset records whose processing lock has outlived the processing timeout.
    pub async fn reclaim_stale(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let timeout = chrono::Duration::from_std(self.settings.processing_timeout)
            .map_err(|e| AppError::Config(format!("processing timeout out of range: {}", e)))?;

        let reclaimed = self.store.reclaim_stale(now - timeout, now).await?;
        for record in &reclaimed {
            tracing::warn!(
                notification_id = %record.id,
                channel = %record.channel,
                "Reclaimed notification with expired processing lock"
            );
            self.audit
                .record_for(
                    AuditEventType::NotificationReclaimed,
                    record,
                    json!({
                        "notification_id": record.id,
                        "channel": record.channel,
                        "attempt": record.attempt_count,
                        "next_attempt_at": record.next_attempt_at,
                    }),
                )
                .await;
        }

        Ok(reclaimed.len())
    }

    async fn dispatch(
        &self,
        worker_id: &WorkerId,
        mut record: NotificationRecord,
        now: DateTime<Utc>,
    ) -> Result<Disposition, AppError> {
        if record.destination.is_empty() {
            match self
                .resolver
                .resolve(record.channel, None, record.user_id)
                .await?
            {
                Resolution::Resolved { destination } => {
                    self.store
                        .set_destination(record.id, worker_id.as_str(), &destination)
                        .await?;
                    record.destination = destination;
                }
                Resolution::Blocked { reason, details, .. } => {
                    let error = format!("{}: {}", reason.as_str(), details);
                    return self
                        .fail(worker_id, &record, &error, FailureReason::Unresolvable, now)
                        .await;
                }
            }
        }

        let sender = self.senders.sender_for(record.channel);
        let outcome = match tokio::time::timeout(self.settings.send_timeout, sender.send(&record)).await
        {
            Ok(outcome) => outcome,
            Err(_) => SendOutcome::failed(
                sender.provider(),
                format!(
                    "timeout: sender did not respond within {}s",
                    self.settings.send_timeout.as_secs()
                ),
            ),
        };

        match outcome {
            SendOutcome::Sent {
                provider,
                provider_message_id,
            } => {
                self.store
                    .mark_sent(
                        record.id,
                        worker_id.as_str(),
                        &provider,
                        provider_message_id.as_deref(),
                        now,
                    )
                    .await?;

                tracing::info!(
                    worker_id = %worker_id,
                    notification_id = %record.id,
                    channel = %record.channel,
                    to = %mask_destination(&record.destination),
                    provider = %provider,
                    "Notification sent"
                );
                self.audit
                    .record_for(
                        AuditEventType::NotificationSent,
                        &record,
                        json!({
                            "notification_id": record.id,
                            "channel": record.channel,
                            "attempt": record.attempt_count + 1,
                            "provider": provider,
                            "provider_message_id": provider_message_id,
                        }),
                    )
                    .await;

                Ok(Disposition::Sent)
            }
            SendOutcome::Failed { error, .. } => self.handle_failure(worker_id, &record, error, now).await,
        }
    }

    async fn handle_failure(
        &self,
        worker_id: &WorkerId,
        record: &NotificationRecord,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<Disposition, AppError> {
        let attempt = attempt_after(record);
        let class = classify(&error);

        match self.policy.decide(attempt, class) {
            RetryDecision::Retry { delay } => {
                let delay = chrono::Duration::from_std(delay)
                    .map_err(|e| AppError::Internal(format!("backoff out of range: {}", e)))?;
                let next_attempt_at = now + delay;

                self.store
                    .schedule_retry(record.id, worker_id.as_str(), &error, next_attempt_at, now)
                    .await?;

                tracing::warn!(
                    worker_id = %worker_id,
                    notification_id = %record.id,
                    channel = %record.channel,
                    attempt,
                    next_attempt_at = %next_attempt_at,
                    error = %error,
                    "Send failed, retry scheduled"
                );
                self.audit
                    .record_for(
                        AuditEventType::NotificationRetryScheduled,
                        record,
                        json!({
                            "notification_id": record.id,
                            "channel": record.channel,
                            "attempt": attempt,
                            "next_attempt_at": next_attempt_at,
                            "error": error,
                            "class": class,
                        }),
                    )
                    .await;

                Ok(Disposition::RetryScheduled { error })
            }
            RetryDecision::GiveUp { reason } => self.fail(worker_id, record, &error, reason, now).await,
        }
    }

    async fn fail(
        &self,
        worker_id: &WorkerId,
        record: &NotificationRecord,
        error: &str,
        reason: FailureReason,
        now: DateTime<Utc>,
    ) -> Result<Disposition, AppError> {
        self.store
            .mark_failed(record.id, worker_id.as_str(), error, now)
            .await?;

        tracing::error!(
            worker_id = %worker_id,
            notification_id = %record.id,
            channel = %record.channel,
            attempt = attempt_after(record),
            reason = reason.as_str(),
            error = %error,
            "Notification failed"
        );
        self.audit
            .record_for(
                AuditEventType::NotificationFailed,
                record,
                json!({
                    "notification_id": record.id,
                    "channel": record.channel,
                    "attempt": attempt_after(record),
                    "error": error,
                    "reason": reason,
                }),
            )
            .await;

        Ok(Disposition::Failed {
            error: error.to_string(),
        })
    }

    /// Fallback for a record whose dispatch errored or panicked. Only an
    /// infrastructure failure here escapes; a lost lock is reported as such.
    async fn fail_unexpected(
        &self,
        worker_id: &WorkerId,
        record: &NotificationRecord,
        cause: &AppError,
        now: DateTime<Utc>,
    ) -> Result<Disposition, AppError> {
        let error = cause.to_string();
        match self
            .fail(worker_id, record, &error, FailureReason::UnexpectedError, now)
            .await
        {
            Ok(disposition) => Ok(disposition),
            Err(AppError::LockLost(_)) => Ok(Disposition::LockLost),
            Err(e) if e.is_infrastructure() => Err(e),
            Err(e) => {
                tracing::error!(
                    notification_id = %record.id,
                    error = %e,
                    "Could not record unexpected failure"
                );
                Ok(Disposition::Failed { error })
            }
        }
    }
}

/// Attempt number of the dispatch in progress.
fn attempt_after(record: &NotificationRecord) -> u32 {
    u32::try_from(record.attempt_count).unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_ids_are_unique_per_invocation() {
        let a = WorkerId::generate();
        let b = WorkerId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("worker-"));
        assert_eq!(a.as_str().len(), "worker-".len() + 8);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let mut summary = BatchSummary::new(WorkerId("worker-test".to_string()), 2);
        summary.tally(Uuid::nil(), Disposition::Sent);
        summary.tally(
            Uuid::nil(),
            Disposition::RetryScheduled {
                error: "HTTP 503".to_string(),
            },
        );

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["workerId"], "worker-test");
        assert_eq!(value["retryScheduled"], 1);
        assert_eq!(value["sent"], 1);
        assert_eq!(value["errors"].as_array().unwrap().len(), 1);
    }
}
