use std::time::Duration;

use draftbell_common::config::AppConfig;

/// Default number of records claimed per worker invocation.
pub const DEFAULT_BATCH_SIZE: u32 = 25;

/// Default bound on dispatch attempts per record.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Tunables for the claim-and-dispatch worker.
#[derive(Debug, Clone)]
pub struct OutboxSettings {
    pub batch_size: u32,
    pub max_attempts: u32,
    /// Upper bound on one sender call. Expiry counts as a transient failure.
    pub send_timeout: Duration,
    /// A `processing` lock older than this is reclaimed by the recovery sweep.
    pub processing_timeout: Duration,
}

impl OutboxSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.outbox_batch_size.max(1),
            max_attempts: config.outbox_max_attempts.max(1),
            send_timeout: Duration::from_secs(config.outbox_send_timeout_secs),
            processing_timeout: Duration::from_secs(config.outbox_processing_timeout_secs),
        }
    }
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            send_timeout: Duration::from_secs(15),
            processing_timeout: Duration::from_secs(300),
        }
    }
}
