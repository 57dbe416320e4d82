//! Channel senders.
//!
//! A sender takes one outbox record and attempts delivery through a single
//! provider, returning a [`SendOutcome`]. Senders never touch the outbox store;
//! every state transition belongs to the dispatch worker.
//!
//! - Email via the Resend HTTP API
//! - SMS via the Telnyx messaging API
//! - Voice and push have no live provider and fail deterministically

pub mod email;
mod http;
pub mod mock;
pub mod phone;
pub mod registry;
pub mod sms;
pub mod unavailable;

use async_trait::async_trait;
use serde::Serialize;

use draftbell_common::types::NotificationRecord;

pub use registry::SenderRegistry;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// The provider accepted the message.
    Sent {
        provider: String,
        provider_message_id: Option<String>,
    },
    /// The attempt failed. `error` is classified by the worker.
    Failed { provider: String, error: String },
}

impl SendOutcome {
    pub fn sent(provider: impl Into<String>, provider_message_id: Option<String>) -> Self {
        SendOutcome::Sent {
            provider: provider.into(),
            provider_message_id,
        }
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        SendOutcome::Failed {
            provider: provider.into(),
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    pub fn provider(&self) -> &str {
        match self {
            SendOutcome::Sent { provider, .. } | SendOutcome::Failed { provider, .. } => provider,
        }
    }
}

/// Delivery capability for one channel.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Provider name recorded on the outbox row.
    fn provider(&self) -> &'static str;

    /// Whether this sender can actually deliver messages.
    fn is_live(&self) -> bool {
        true
    }

    /// Attempt delivery of `notification` to its resolved destination.
    ///
    /// Failures are reported through [`SendOutcome::Failed`], never by panicking.
    async fn send(&self, notification: &NotificationRecord) -> SendOutcome;
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use draftbell_common::types::{Channel, NotificationRecord, NotificationStatus};

    /// A claimed record ready to hand to a sender.
    pub fn record(channel: Channel, destination: &str, payload: serde_json::Value) -> NotificationRecord {
        let now = Utc::now();
        NotificationRecord {
            id: Uuid::new_v4(),
            channel,
            destination: destination.to_string(),
            user_id: None,
            league_id: None,
            team_id: None,
            template_key: None,
            message_text: Some("You're on the clock".to_string()),
            payload,
            status: NotificationStatus::Processing,
            attempt_count: 0,
            last_error: None,
            next_attempt_at: now,
            last_attempt_at: None,
            locked_at: Some(now),
            locked_by: Some("worker-test".to_string()),
            provider: None,
            provider_message_id: None,
            sent_at: None,
            delivery_status: None,
            provider_delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
