//! Delivery webhook reconciliation against the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{Channel, DeliveryStatus, NotificationStatus};
use draftbell_notifier::SenderRegistry;
use draftbell_notifier::mock::MockSender;
use draftbell_outbox::enqueue::{EnqueueRequest, EnqueueService};
use draftbell_outbox::profile::MemoryProfileStore;
use draftbell_outbox::resolver::Resolver;
use draftbell_outbox::settings::OutboxSettings;
use draftbell_outbox::store::{MemoryOutboxStore, OutboxStore};
use draftbell_outbox::webhook::{DeliveryWebhookHandler, WebhookOutcome};
use draftbell_outbox::worker::OutboxWorker;

/// Send one SMS through the mock sender, then relabel it as a Telnyx message.
async fn sent_sms(store: &Arc<MemoryOutboxStore>, provider_message_id: &str) -> Uuid {
    let resolver = Resolver::new(Arc::new(MemoryProfileStore::new()), false);
    let senders = SenderRegistry::unavailable()
        .with_sender(Channel::Sms, Arc::new(MockSender::new(Channel::Sms)));
    let enqueue = EnqueueService::new(store.clone(), resolver.clone());
    let worker = OutboxWorker::new(store.clone(), resolver, senders, OutboxSettings::default());

    let id = enqueue
        .enqueue(
            EnqueueRequest {
                channel: Some(Channel::Sms),
                destination: Some("+15551234567".to_string()),
                message_text: Some("You're on the clock".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
        .notification_id;
    worker
        .run_at(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();

    let mut record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, NotificationStatus::Sent);
    record.provider = Some("telnyx".to_string());
    record.provider_message_id = Some(provider_message_id.to_string());
    store.put(record).await;
    id
}

fn telnyx_event(event_type: &str, message_id: &str, recipient_status: &str) -> serde_json::Value {
    json!({
        "data": {
            "event_type": event_type,
            "id": Uuid::new_v4(),
            "occurred_at": "2026-03-01T12:00:05.000+00:00",
            "payload": {
                "id": message_id,
                "to": [{ "phone_number": "+15551234567", "status": recipient_status }],
                "completed_at": "2026-03-01T12:00:04.000+00:00"
            },
            "record_type": "event"
        },
        "meta": { "attempt": 1 }
    })
}

#[tokio::test]
async fn test_finalized_event_marks_delivered() {
    let store = Arc::new(MemoryOutboxStore::new());
    let id = sent_sms(&store, "msg-delivered").await;
    let handler = DeliveryWebhookHandler::new(store.clone());

    let outcome = handler
        .handle_telnyx(&telnyx_event("message.finalized", "msg-delivered", "delivered"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Updated { matched: 1, .. }));

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.delivery_status, Some(DeliveryStatus::Delivered));
    assert!(record.provider_delivered_at.is_some());
    assert_eq!(record.status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_delivery_failure_is_recorded_without_timestamp() {
    let store = Arc::new(MemoryOutboxStore::new());
    let id = sent_sms(&store, "msg-failed").await;
    let handler = DeliveryWebhookHandler::new(store.clone());

    handler
        .handle_telnyx(&telnyx_event("message.finalized", "msg-failed", "delivery_failed"))
        .await
        .unwrap();

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.delivery_status, Some(DeliveryStatus::DeliveryFailed));
    assert!(record.provider_delivered_at.is_none());
}

#[tokio::test]
async fn test_unknown_message_id_changes_nothing() {
    let store = Arc::new(MemoryOutboxStore::new());
    let id = sent_sms(&store, "msg-known").await;
    let before = store.get(id).await.unwrap().unwrap();
    let handler = DeliveryWebhookHandler::new(store.clone());

    let outcome = handler
        .handle_telnyx(&telnyx_event("message.finalized", "msg-unknown", "delivered"))
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::Updated { matched: 0, .. }));

    let after = store.get(id).await.unwrap().unwrap();
    assert_eq!(after.delivery_status, None);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn test_unrecognized_events_are_ignored() {
    let store = Arc::new(MemoryOutboxStore::new());
    let id = sent_sms(&store, "msg-1").await;
    let handler = DeliveryWebhookHandler::new(store.clone());

    for event in ["message.sent", "message.received", "call.initiated"] {
        let outcome = handler
            .handle_telnyx(&telnyx_event(event, "msg-1", "sent"))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }), "{}", event);
    }

    let missing_id = json!({ "data": { "event_type": "message.delivery_failed", "payload": {} } });
    let outcome = handler.handle_telnyx(&missing_id).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    assert_eq!(store.get(id).await.unwrap().unwrap().delivery_status, None);
}

#[tokio::test]
async fn test_finalized_without_recipient_status_leaves_record_untouched() {
    let store = Arc::new(MemoryOutboxStore::new());
    let id = sent_sms(&store, "msg-bare").await;
    let handler = DeliveryWebhookHandler::new(store.clone());

    let bare = json!({
        "data": {
            "event_type": "message.finalized",
            "occurred_at": "2026-03-01T12:00:05.000+00:00",
            "payload": { "id": "msg-bare", "errors": [{ "code": "40300" }] }
        }
    });
    let outcome = handler.handle_telnyx(&bare).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.delivery_status, None);
    assert_eq!(record.provider_delivered_at, None);

    let outcome = handler
        .handle_telnyx(&telnyx_event("message.delivery_failed", "msg-bare", "delivery_failed"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Updated { matched: 1, delivery_status: DeliveryStatus::DeliveryFailed, .. }
    ));
    assert_eq!(
        store.get(id).await.unwrap().unwrap().delivery_status,
        Some(DeliveryStatus::DeliveryFailed)
    );
}

#[tokio::test]
async fn test_malformed_envelope_is_rejected() {
    let handler = DeliveryWebhookHandler::new(Arc::new(MemoryOutboxStore::new()));

    let err = handler.handle_telnyx(&json!({ "event": "x" })).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let err = handler
        .handle_telnyx(&json!({ "data": { "payload": {} } }))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_store_outage_surfaces_as_error() {
    let store = Arc::new(MemoryOutboxStore::new());
    let handler = DeliveryWebhookHandler::new(store.clone());
    store.set_unavailable(true);

    let err = handler
        .handle_telnyx(&telnyx_event("message.finalized", "msg-1", "delivered"))
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());
}
