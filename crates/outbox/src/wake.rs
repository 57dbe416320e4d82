//! Redis wake signal between the enqueue path and the worker loop.
//!
//! Advisory only: a lost signal delays dispatch until the next poll, it never
//! loses a notification.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// List the API pushes to and the worker blocks on.
pub const WAKE_KEY: &str = "outbox:wake";

#[derive(Clone)]
pub struct WakeSignal {
    redis: ConnectionManager,
}

impl WakeSignal {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Raise the signal. Pending signals collapse into one.
    pub async fn notify(&self) {
        let mut redis = self.redis.clone();
        let result: redis::RedisResult<()> = redis::pipe()
            .lpush(WAKE_KEY, 1)
            .ignore()
            .ltrim(WAKE_KEY, 0, 0)
            .ignore()
            .query_async(&mut redis)
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to raise outbox wake signal");
        }
    }

    /// Block until the signal is raised or `timeout` elapses. Returns `true`
    /// when woken by a signal.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut redis = self.redis.clone();
        let secs = timeout.as_secs().max(1) as f64;

        match redis.blpop::<_, Option<(String, String)>>(WAKE_KEY, secs).await {
            Ok(popped) => popped.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Wake signal unavailable, falling back to polling");
                tokio::time::sleep(timeout).await;
                false
            }
        }
    }
}
