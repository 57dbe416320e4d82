//! Email delivery through the Resend HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use draftbell_common::types::{NotificationRecord, mask_destination};

use crate::http::{describe_status, describe_transport_error};
use crate::{SendOutcome, Sender};

const PROVIDER: &str = "resend";
const DEFAULT_BASE_URL: &str = "https://api.resend.com";
const DEFAULT_SUBJECT: &str = "Draft notification";

/// Resend credentials.
#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub base_url: String,
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Sends email through Resend.
pub struct ResendEmailSender {
    config: ResendConfig,
    client: Client,
}

impl ResendEmailSender {
    pub fn new(config: ResendConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn build_request<'a>(&'a self, notification: &'a NotificationRecord) -> SendEmailRequest<'a> {
        let subject = notification
            .payload
            .get("subject")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
            .to_string();

        SendEmailRequest {
            from: &self.config.from,
            to: vec![notification.destination.as_str()],
            subject,
            text: notification.body_text(),
        }
    }
}

#[async_trait]
impl Sender for ResendEmailSender {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(&self, notification: &NotificationRecord) -> SendOutcome {
        if !notification.destination.contains('@') {
            return SendOutcome::failed(PROVIDER, "invalid destination format: not an email address");
        }

        let url = format!("{}/emails", self.config.base_url);
        let request = self.build_request(notification);

        tracing::debug!(
            notification_id = %notification.id,
            to = %mask_destination(&notification.destination),
            "Sending email via Resend"
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

        match response.json::<SendEmailResponse>().await {
            Ok(body) => SendOutcome::sent(PROVIDER, body.id),
            // Accepted by the provider; only the id is missing.
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "Resend accepted the email but the response could not be parsed"
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

    fn record(destination: &str, payload: serde_json::Value) -> NotificationRecord {
        test_support::record(Channel::Email, destination, payload)
    }

    fn sender() -> ResendEmailSender {
        ResendEmailSender::new(
            ResendConfig::new("re_test", "Draftbell <noreply@draftbell.test>"),
            Client::new(),
        )
    }

    #[test]
    fn test_request_uses_payload_subject() {
        let sender = sender();
        let rec = record("coach@example.com", serde_json::json!({"subject": "Round 3"}));
        let req = sender.build_request(&rec);
        assert_eq!(req.subject, "Round 3");
        assert_eq!(req.to, vec!["coach@example.com"]);
        assert_eq!(req.text, "You're on the clock");
    }

    #[test]
    fn test_request_default_subject() {
        let sender = sender();
        let rec = record("coach@example.com", serde_json::json!({}));
        assert_eq!(sender.build_request(&rec).subject, DEFAULT_SUBJECT);
    }

    #[tokio::test]
    async fn test_malformed_address_fails_without_network() {
        let sender = sender();
        let outcome = sender.send(&record("not-an-email", serde_json::json!({}))).await;
        match outcome {
            SendOutcome::Failed { error, .. } => assert!(error.contains("invalid destination")),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
