//! Best-effort audit trail for worker transitions.

use std::sync::Arc;

use draftbell_common::types::{AuditEventType, NotificationRecord};

use crate::store::{NewAuditEvent, OutboxStore};

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn OutboxStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    /// Append an event. A failed write is logged and swallowed; it never
    /// undoes or blocks the transition it describes.
    pub async fn record(&self, event: NewAuditEvent) {
        let event_type = event.event_type;
        let notification_id = event.notification_id;
        if let Err(e) = self.store.append_audit(event).await {
            tracing::warn!(
                event_type = %event_type,
                notification_id = %notification_id,
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    pub async fn record_for(
        &self,
        event_type: AuditEventType,
        record: &NotificationRecord,
        payload: serde_json::Value,
    ) {
        self.record(NewAuditEvent::for_record(event_type, record, payload))
            .await;
    }
}
