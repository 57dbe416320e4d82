//! Worker loop: recovery sweep, then claim-and-dispatch, then wait.
//!
//! A full batch means more work is likely due, so the next pass starts
//! immediately. Otherwise the loop waits for the Redis wake signal, bounded by
//! the poll interval, or just sleeps when Redis is not configured.

use std::time::Duration;

use chrono::{DateTime, Utc};

use draftbell_common::error::AppError;
use draftbell_outbox::wake::WakeSignal;
use draftbell_outbox::worker::{BatchSummary, OutboxWorker};

pub struct OutboxRunner {
    worker: OutboxWorker,
    wake: Option<WakeSignal>,
    poll_interval: Duration,
}

impl OutboxRunner {
    pub fn new(worker: OutboxWorker, wake: Option<WakeSignal>, poll_interval: Duration) -> Self {
        Self {
            worker,
            wake,
            poll_interval,
        }
    }

    /// Run until the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            batch_size = self.worker.settings().batch_size,
            max_attempts = self.worker.settings().max_attempts,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            wake_signal = self.wake.is_some(),
            "Outbox worker started"
        );

        loop {
            match self.tick(Utc::now()).await {
                Ok(summary) if self.batch_was_full(&summary) => continue,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Outbox pass failed, backing off");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            }

            self.idle().await;
        }
    }

    /// One pass: reclaim stale locks, then dispatch one batch.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<BatchSummary, AppError> {
        let reclaimed = self.worker.reclaim_stale(now).await?;
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Recovered notifications with expired locks");
        }

        self.worker.run_at(now).await
    }

    pub fn batch_was_full(&self, summary: &BatchSummary) -> bool {
        summary.claimed > 0 && summary.claimed >= self.worker.settings().batch_size as usize
    }

    async fn idle(&self) {
        match &self.wake {
            Some(wake) => {
                if wake.wait(self.poll_interval).await {
                    tracing::debug!("Woken by enqueue signal");
                }
            }
            None => tokio::time::sleep(self.poll_interval).await,
        }
    }
}
