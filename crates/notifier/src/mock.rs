//! Logging sender for local development.

use async_trait::async_trait;
use uuid::Uuid;

use draftbell_common::types::{Channel, NotificationRecord, mask_destination};

use crate::{SendOutcome, Sender};

/// Logs the message and reports success with provider `mock`.
pub struct MockSender {
    channel: Channel,
}

impl MockSender {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Sender for MockSender {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, notification: &NotificationRecord) -> SendOutcome {
        tracing::info!(
            notification_id = %notification.id,
            channel = %self.channel,
            to = %mask_destination(&notification.destination),
            body = %notification.body_text(),
            "[MOCK] Notification delivered"
        );
        SendOutcome::sent(
            self.provider(),
            Some(format!("mock-{}-{}", self.channel, Uuid::new_v4().simple())),
        )
    }
}
