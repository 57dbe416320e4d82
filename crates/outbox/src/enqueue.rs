//! Enqueue: validate, resolve once, then persist the record with its first
//! audit event.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{AuditEventType, Channel, NotificationStatus, mask_destination};

use crate::resolver::{BlockReason, Resolution, Resolver};
use crate::store::{NewAuditEvent, NewNotification, OutboxStore};

#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    pub channel: Option<Channel>,
    pub destination: Option<String>,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template_key: Option<String>,
    pub message_text: Option<String>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResult {
    /// `false` when the record was created blocked.
    pub accepted: bool,
    pub notification_id: Uuid,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlockReason>,
    /// Masked resolved destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Clone)]
pub struct EnqueueService {
    store: Arc<dyn OutboxStore>,
    resolver: Resolver,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl EnqueueService {
    pub fn new(store: Arc<dyn OutboxStore>, resolver: Resolver) -> Self {
        Self { store, resolver }
    }

    /// Create one outbox record. Blocked outcomes are returned as values with
    /// `accepted = false`; only malformed input and store failures are errors.
    pub async fn enqueue(
        &self,
        request: EnqueueRequest,
        requested_by: Option<Uuid>,
    ) -> Result<EnqueueResult, AppError> {
        let channel = request
            .channel
            .ok_or_else(|| AppError::InvalidRequest("channel is required".to_string()))?;

        let destination = non_blank(request.destination);
        if destination.is_none() && request.user_id.is_none() {
            return Err(AppError::InvalidRequest(
                "either destination or userId is required".to_string(),
            ));
        }

        let template_key = non_blank(request.template_key);
        let message_text = non_blank(request.message_text);
        if template_key.is_none() && message_text.is_none() {
            return Err(AppError::InvalidRequest(
                "either templateKey or messageText is required".to_string(),
            ));
        }

        let resolution = self
            .resolver
            .resolve(channel, destination.as_deref(), request.user_id)
            .await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut notification = NewNotification {
            id,
            channel,
            destination: String::new(),
            user_id: request.user_id,
            league_id: request.league_id,
            team_id: request.team_id,
            template_key,
            message_text,
            payload: request.payload.unwrap_or_else(|| json!({})),
            status: NotificationStatus::Pending,
            last_error: None,
            next_attempt_at: now,
        };
        let mut audit = NewAuditEvent {
            event_type: AuditEventType::NotificationEnqueued,
            notification_id: id,
            user_id: request.user_id,
            league_id: request.league_id,
            payload: json!({}),
        };

        let (reason, masked) = match resolution {
            Resolution::Resolved { destination } => {
                let masked = mask_destination(&destination);
                audit.payload = json!({
                    "notification_id": id,
                    "channel": channel,
                    "destination": masked,
                    "template_key": notification.template_key,
                    "requested_by": requested_by,
                });
                notification.destination = destination;
                (None, Some(masked))
            }
            Resolution::Blocked {
                reason,
                details,
                destination,
            } => {
                let masked = destination.as_deref().map(mask_destination);
                audit.event_type = AuditEventType::NotificationBlocked;
                audit.payload = json!({
                    "notification_id": id,
                    "channel": channel,
                    "destination": masked,
                    "reason": reason,
                    "details": details,
                    "requested_by": requested_by,
                });
                notification.status = reason.status();
                notification.destination = destination.unwrap_or_default();
                notification.last_error = Some(details);
                (Some(reason), masked)
            }
        };

        let record = self.store.insert_with_audit(notification, audit).await?;

        match reason {
            None => tracing::info!(
                notification_id = %record.id,
                channel = %record.channel,
                to = masked.as_deref().unwrap_or_default(),
                "Notification enqueued"
            ),
            Some(reason) => tracing::info!(
                notification_id = %record.id,
                channel = %record.channel,
                reason = reason.as_str(),
                details = record.last_error.as_deref().unwrap_or_default(),
                "Notification blocked"
            ),
        }

        Ok(EnqueueResult {
            accepted: reason.is_none(),
            notification_id: record.id,
            status: record.status,
            reason,
            destination: masked,
        })
    }
}
