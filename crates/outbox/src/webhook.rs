//! Provider delivery reports.
//!
//! Providers retry webhooks they consider unacknowledged, so anything that is
//! not a recognized delivery report is accepted and ignored rather than
//! rejected. Only a structurally invalid envelope or a store failure is an
//! error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use draftbell_common::error::AppError;
use draftbell_common::types::DeliveryStatus;
use draftbell_notifier::sms;

use crate::store::OutboxStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Updated {
        provider_message_id: String,
        delivery_status: DeliveryStatus,
        matched: u64,
    },
    Ignored {
        reason: String,
    },
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        WebhookOutcome::Ignored {
            reason: reason.into(),
        }
    }
}

/// Map a Telnyx messaging event to a delivery status. `None` means the event
/// carries no delivery outcome, including a finalized event with no recipient
/// status.
pub fn map_telnyx_event(event_type: &str, payload: &Value) -> Option<DeliveryStatus> {
    match event_type {
        "message.delivery_failed" => Some(DeliveryStatus::DeliveryFailed),
        "message.finalized" => {
            let recipient_status = payload
                .get("to")
                .and_then(Value::as_array)
                .and_then(|to| to.first())
                .and_then(|recipient| recipient.get("status"))
                .and_then(Value::as_str);

            match recipient_status {
                Some("delivered") => Some(DeliveryStatus::Delivered),
                Some("delivery_failed" | "sending_failed" | "delivery_unconfirmed") => {
                    Some(DeliveryStatus::DeliveryFailed)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Clone)]
pub struct DeliveryWebhookHandler {
    store: Arc<dyn OutboxStore>,
}

impl DeliveryWebhookHandler {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    /// Apply a Telnyx webhook envelope (`{"data": {"event_type", "payload"}}`).
    pub async fn handle_telnyx(&self, body: &Value) -> Result<WebhookOutcome, AppError> {
        let data = body
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| AppError::InvalidRequest("webhook body has no data object".into()))?;
        let event_type = data
            .get("event_type")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::InvalidRequest("webhook body has no event_type".into()))?;
        let payload = data.get("payload").unwrap_or(&Value::Null);

        let Some(status) = map_telnyx_event(event_type, payload) else {
            tracing::debug!(event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::ignored(format!("no delivery outcome in {}", event_type)));
        };

        let Some(message_id) = payload.get("id").and_then(Value::as_str) else {
            tracing::warn!(event_type, "Webhook event without message id");
            return Ok(WebhookOutcome::ignored("missing message id"));
        };

        let delivered_at = match status {
            DeliveryStatus::Delivered => timestamp(payload.get("completed_at"))
                .or_else(|| timestamp(data.get("occurred_at")))
                .or_else(|| Some(Utc::now())),
            DeliveryStatus::DeliveryFailed => None,
        };

        let matched = self
            .store
            .record_delivery_status(sms::PROVIDER, message_id, status, delivered_at)
            .await?;

        if matched == 0 {
            tracing::info!(
                provider_message_id = message_id,
                delivery_status = %status,
                "Delivery report for unknown message"
            );
        } else {
            tracing::info!(
                provider_message_id = message_id,
                delivery_status = %status,
                matched,
                "Delivery status recorded"
            );
        }

        Ok(WebhookOutcome::Updated {
            provider_message_id: message_id.to_string(),
            delivery_status: status,
            matched,
        })
    }
}
