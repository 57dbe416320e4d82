use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Voice,
    Push,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Sms, Channel::Voice, Channel::Push];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Voice => "voice",
            Channel::Push => "push",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            "voice" => Ok(Channel::Voice),
            "push" => Ok(Channel::Push),
            other => Err(format!(
                "Unknown channel '{}'. Valid channels: email, sms, voice, push",
                other
            )),
        }
    }
}

/// Lifecycle status of an outbox record.
///
/// ```text
/// pending ──claim──▶ processing ──▶ sent
///    ▲                   │
///    │                   ├──▶ retry_scheduled ──claim──▶ processing ...
///    │                   └──▶ failed
///  enqueue ──▶ blocked_no_consent | blocked_no_destination
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Processing,
    Sent,
    RetryScheduled,
    Failed,
    BlockedNoConsent,
    BlockedNoDestination,
}

impl NotificationStatus {
    /// Statuses a worker may claim from.
    pub const CLAIMABLE: [NotificationStatus; 2] =
        [NotificationStatus::Pending, NotificationStatus::RetryScheduled];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Processing => "processing",
            NotificationStatus::Sent => "sent",
            NotificationStatus::RetryScheduled => "retry_scheduled",
            NotificationStatus::Failed => "failed",
            NotificationStatus::BlockedNoConsent => "blocked_no_consent",
            NotificationStatus::BlockedNoDestination => "blocked_no_destination",
        }
    }

    pub fn is_claimable(&self) -> bool {
        Self::CLAIMABLE.contains(self)
    }

    /// Terminal records are never claimed again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent
                | NotificationStatus::Failed
                | NotificationStatus::BlockedNoConsent
                | NotificationStatus::BlockedNoDestination
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-confirmed end-to-end delivery outcome, reported after `sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    DeliveryFailed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::DeliveryFailed => "delivery_failed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound message and its dispatch lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub channel: Channel,
    /// Empty until resolution succeeds; never changed once non-empty.
    pub destination: String,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template_key: Option<String>,
    pub message_text: Option<String>,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub provider: Option<String>,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivery_status: Option<DeliveryStatus>,
    pub provider_delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Text handed to a provider: the rendered message, or a template reference.
    pub fn body_text(&self) -> String {
        match (&self.message_text, &self.template_key) {
            (Some(text), _) if !text.is_empty() => text.clone(),
            (_, Some(key)) => format!("Template: {}", key),
            _ => String::new(),
        }
    }
}

/// Lifecycle transition recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AuditEventType {
    NotificationEnqueued,
    NotificationSent,
    NotificationRetryScheduled,
    NotificationFailed,
    NotificationBlocked,
    NotificationReclaimed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::NotificationEnqueued => "notification_enqueued",
            AuditEventType::NotificationSent => "notification_sent",
            AuditEventType::NotificationRetryScheduled => "notification_retry_scheduled",
            AuditEventType::NotificationFailed => "notification_failed",
            AuditEventType::NotificationBlocked => "notification_blocked",
            AuditEventType::NotificationReclaimed => "notification_reclaimed",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: AuditEventType,
    pub notification_id: Uuid,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Phone and consent snapshot for a user, read from `user_notification_settings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub phone_e164: Option<String>,
    pub phone_verified: bool,
    #[sqlx(rename = "consent_sms")]
    pub sms_consent: bool,
    pub opted_out_sms: bool,
    #[sqlx(rename = "consent_voice")]
    pub voice_consent: bool,
    pub opted_out_voice: bool,
}

/// Mask an email address or phone number for logs and audit payloads.
///
/// `alice@example.com` → `a***@example.com`, `+15551234567` → `+*******4567`.
pub fn mask_destination(destination: &str) -> String {
    if let Some((local, domain)) = destination.split_once('@') {
        let first = local.chars().next().map(String::from).unwrap_or_default();
        return format!("{}***@{}", first, domain);
    }

    let chars: Vec<char> = destination.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }

    let visible = chars.len() - 4;
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i >= visible || (i == 0 && *c == '+') {
                *c
            } else {
                '*'
            }
        })
        .collect()
}
