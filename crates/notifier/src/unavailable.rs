//! Sender for channels without a configured provider.

use async_trait::async_trait;

use draftbell_common::types::{Channel, NotificationRecord};

use crate::{SendOutcome, Sender};

/// Always fails with the same permanent error.
pub struct UnavailableSender {
    channel: Channel,
}

impl UnavailableSender {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    pub fn error_message(&self) -> String {
        format!("no provider configured for {} notifications", self.channel)
    }
}

#[async_trait]
impl Sender for UnavailableSender {
    fn provider(&self) -> &'static str {
        "none"
    }

    fn is_live(&self) -> bool {
        false
    }

    async fn send(&self, notification: &NotificationRecord) -> SendOutcome {
        tracing::debug!(
            notification_id = %notification.id,
            channel = %self.channel,
            "Channel has no provider configured"
        );
        SendOutcome::failed(self.provider(), self.error_message())
    }
}
