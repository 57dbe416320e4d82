use std::sync::Arc;
use std::time::Duration;

use draftbell_common::config::AppConfig;
use draftbell_common::db;
use draftbell_common::redis_pool::create_redis_pool;
use draftbell_common::types::Channel;
use draftbell_notifier::SenderRegistry;
use draftbell_outbox::profile::PgProfileStore;
use draftbell_outbox::resolver::Resolver;
use draftbell_outbox::settings::OutboxSettings;
use draftbell_outbox::store::PgOutboxStore;
use draftbell_outbox::wake::WakeSignal;
use draftbell_outbox::worker::OutboxWorker;
use draftbell_worker::runner::OutboxRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "draftbell_worker=info,draftbell_outbox=info,draftbell_notifier=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Draftbell outbox worker starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let wake = match create_redis_pool(&config.redis_url).await {
        Ok(redis) => Some(WakeSignal::new(redis)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, polling only");
            None
        }
    };

    let senders = SenderRegistry::from_config(&config)?;
    let resolver = Resolver::new(
        Arc::new(PgProfileStore::new(pool.clone())),
        senders.is_live(Channel::Voice),
    );
    let worker = OutboxWorker::new(
        Arc::new(PgOutboxStore::new(pool)),
        resolver,
        senders,
        OutboxSettings::from_config(&config),
    );
    let runner = OutboxRunner::new(
        worker,
        wake,
        Duration::from_millis(config.outbox_poll_interval_ms),
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = runner.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Outbox worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Draftbell outbox worker stopped.");
    Ok(())
}
