//! One sender per channel.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use draftbell_common::config::{AppConfig, SenderMode};
use draftbell_common::types::Channel;

use crate::Sender;
use crate::email::{ResendConfig, ResendEmailSender};
use crate::mock::MockSender;
use crate::sms::{TelnyxConfig, TelnyxSmsSender};
use crate::unavailable::UnavailableSender;

/// Closed mapping from channel to sender. Adding a channel is a compile error
/// here until it is wired.
#[derive(Clone)]
pub struct SenderRegistry {
    email: Arc<dyn Sender>,
    sms: Arc<dyn Sender>,
    voice: Arc<dyn Sender>,
    push: Arc<dyn Sender>,
}

impl SenderRegistry {
    /// Every channel unavailable. Tests replace individual senders with [`Self::with_sender`].
    pub fn unavailable() -> Self {
        Self {
            email: Arc::new(UnavailableSender::new(Channel::Email)),
            sms: Arc::new(UnavailableSender::new(Channel::Sms)),
            voice: Arc::new(UnavailableSender::new(Channel::Voice)),
            push: Arc::new(UnavailableSender::new(Channel::Push)),
        }
    }

    /// Email and SMS log instead of delivering. Voice and push stay unavailable.
    pub fn mock() -> Self {
        Self::unavailable()
            .with_sender(Channel::Email, Arc::new(MockSender::new(Channel::Email)))
            .with_sender(Channel::Sms, Arc::new(MockSender::new(Channel::Sms)))
    }

    /// Wire providers from configuration. Channels without credentials are unavailable.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if config.sender_mode == SenderMode::Mock {
            tracing::warn!("SENDER_MODE=mock, notifications are logged, not delivered");
            return Ok(Self::mock());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.outbox_send_timeout_secs))
            .build()?;

        let mut registry = Self::unavailable();

        match (&config.resend_api_key, &config.email_from) {
            (Some(key), Some(from)) => {
                let sender = ResendEmailSender::new(ResendConfig::new(key, from), client.clone());
                registry = registry.with_sender(Channel::Email, Arc::new(sender));
            }
            _ => tracing::warn!("RESEND_API_KEY/EMAIL_FROM not set, email channel unavailable"),
        }

        match (&config.telnyx_api_key, &config.telnyx_from_number) {
            (Some(key), Some(from)) => {
                let telnyx = TelnyxConfig::new(key, from)
                    .with_messaging_profile(config.telnyx_messaging_profile_id.clone());
                let sender = TelnyxSmsSender::new(telnyx, client);
                registry = registry.with_sender(Channel::Sms, Arc::new(sender));
            }
            _ => tracing::warn!("TELNYX_API_KEY/TELNYX_FROM_NUMBER not set, sms channel unavailable"),
        }

        for channel in Channel::ALL {
            tracing::info!(
                channel = %channel,
                provider = registry.sender_for(channel).provider(),
                live = registry.is_live(channel),
                "Channel sender configured"
            );
        }

        Ok(registry)
    }

    /// Replace the sender for one channel.
    pub fn with_sender(mut self, channel: Channel, sender: Arc<dyn Sender>) -> Self {
        match channel {
            Channel::Email => self.email = sender,
            Channel::Sms => self.sms = sender,
            Channel::Voice => self.voice = sender,
            Channel::Push => self.push = sender,
        }
        self
    }

    pub fn sender_for(&self, channel: Channel) -> Arc<dyn Sender> {
        match channel {
            Channel::Email => Arc::clone(&self.email),
            Channel::Sms => Arc::clone(&self.sms),
            Channel::Voice => Arc::clone(&self.voice),
            Channel::Push => Arc::clone(&self.push),
        }
    }

    /// Whether a real (or mock) provider backs `channel`.
    pub fn is_live(&self, channel: Channel) -> bool {
        self.sender_for(channel).is_live()
    }
}
