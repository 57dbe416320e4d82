//! Shared application state for the Axum API server.

use std::sync::Arc;

use draftbell_common::config::AppConfig;
use draftbell_common::types::Channel;
use draftbell_notifier::SenderRegistry;
use draftbell_outbox::enqueue::EnqueueService;
use draftbell_outbox::profile::ProfileStore;
use draftbell_outbox::resolver::Resolver;
use draftbell_outbox::settings::OutboxSettings;
use draftbell_outbox::store::OutboxStore;
use draftbell_outbox::wake::WakeSignal;
use draftbell_outbox::webhook::DeliveryWebhookHandler;
use draftbell_outbox::worker::OutboxWorker;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OutboxStore>,
    pub enqueue: EnqueueService,
    pub worker: OutboxWorker,
    pub webhooks: DeliveryWebhookHandler,
    /// Absent when Redis is unreachable; the worker then relies on polling.
    pub wake: Option<WakeSignal>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        profiles: Arc<dyn ProfileStore>,
        senders: SenderRegistry,
        wake: Option<WakeSignal>,
        config: AppConfig,
    ) -> Self {
        let resolver = Resolver::new(profiles, senders.is_live(Channel::Voice));
        let settings = OutboxSettings::from_config(&config);

        Self {
            enqueue: EnqueueService::new(Arc::clone(&store), resolver.clone()),
            worker: OutboxWorker::new(Arc::clone(&store), resolver, senders, settings),
            webhooks: DeliveryWebhookHandler::new(Arc::clone(&store)),
            store,
            wake,
            config,
        }
    }
}
