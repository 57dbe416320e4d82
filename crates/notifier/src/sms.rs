//! SMS delivery through the Telnyx messaging API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use draftbell_common::types::{NotificationRecord, mask_destination};

use crate::http::{describe_status, describe_transport_error};
use crate::phone::is_valid_e164;
use crate::{SendOutcome, Sender};

pub const PROVIDER: &str = "telnyx";
const DEFAULT_BASE_URL: &str = "https://api.telnyx.com/v2";

/// Telnyx credentials and sending identity.
#[derive(Debug, Clone)]
pub struct TelnyxConfig {
    pub api_key: String,
    pub from_number: String,
    pub messaging_profile_id: Option<String>,
    pub base_url: String,
}

impl TelnyxConfig {
    pub fn new(api_key: impl Into<String>, from_number: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from_number: from_number.into(),
            messaging_profile_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_messaging_profile(mut self, profile_id: Option<String>) -> Self {
        self.messaging_profile_id = profile_id;
        self
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    messaging_profile_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    id: String,
}

/// Sends SMS through Telnyx.
pub struct TelnyxSmsSender {
    config: TelnyxConfig,
    client: Client,
}

impl TelnyxSmsSender {
    pub fn new(config: TelnyxConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn build_request<'a>(&'a self, notification: &'a NotificationRecord) -> SendMessageRequest<'a> {
        SendMessageRequest {
            from: &self.config.from_number,
            to: &notification.destination,
            text: notification.body_text(),
            messaging_profile_id: self.config.messaging_profile_id.as_deref(),
        }
    }
}

#[async_trait]
impl Sender for TelnyxSmsSender {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(&self, notification: &NotificationRecord) -> SendOutcome {
        if !is_valid_e164(&notification.destination) {
            return SendOutcome::failed(
                PROVIDER,
                "invalid destination format: phone number is not E.164",
            );
        }

        let url = format!("{}/messages", self.config.base_url);
        let request = self.build_request(notification);

        tracing::debug!(
            notification_id = %notification.id,
            to = %mask_destination(&notification.destination),
            "Sending SMS via Telnyx"
        );

        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return SendOutcome::failed(PROVIDER, describe_transport_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return SendOutcome::failed(PROVIDER, describe_status(status, &body));
        }

        // Without the message id delivery webhooks cannot be correlated, but the
        // provider has taken the message and a retry would send it twice.
        match response.json::<SendMessageResponse>().await {
            Ok(body) => SendOutcome::sent(PROVIDER, Some(body.data.id)),
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "Telnyx accepted the message but the response could not be parsed"
                );
                SendOutcome::sent(PROVIDER, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use draftbell_common::types::Channel;

    fn sender(profile: Option<&str>) -> TelnyxSmsSender {
        TelnyxSmsSender::new(
            TelnyxConfig::new("KEY_test", "+15550001111")
                .with_messaging_profile(profile.map(String::from)),
            Client::new(),
        )
    }

    #[test]
    fn test_request_body_shape() {
        let sender = sender(Some("profile-1"));
        let rec = test_support::record(Channel::Sms, "+15551234567", serde_json::json!({}));
        let body = serde_json::to_value(sender.build_request(&rec)).unwrap();
        assert_eq!(body["from"], "+15550001111");
        assert_eq!(body["to"], "+15551234567");
        assert_eq!(body["text"], "You're on the clock");
        assert_eq!(body["messaging_profile_id"], "profile-1");
    }

    #[test]
    fn test_request_omits_missing_profile() {
        let sender = sender(None);
        let rec = test_support::record(Channel::Sms, "+15551234567", serde_json::json!({}));
        let body = serde_json::to_value(sender.build_request(&rec)).unwrap();
        assert!(body.get("messaging_profile_id").is_none());
    }

    #[tokio::test]
    async fn test_non_e164_destination_is_rejected_locally() {
        let sender = sender(None);
        let rec = test_support::record(Channel::Sms, "555-1234", serde_json::json!({}));
        match sender.send(&rec).await {
            SendOutcome::Failed { provider, error } => {
                assert_eq!(provider, PROVIDER);
                assert!(error.starts_with("invalid destination format"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
