//! Draftbell API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use draftbell_common::config::AppConfig;
use draftbell_common::db::{create_pool, run_migrations};
use draftbell_common::redis_pool::create_redis_pool;
use draftbell_notifier::SenderRegistry;
use draftbell_outbox::profile::PgProfileStore;
use draftbell_outbox::store::PgOutboxStore;
use draftbell_outbox::wake::WakeSignal;

use draftbell_api::routes::create_router;
use draftbell_api::state::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("draftbell_api=debug,draftbell_outbox=debug,draftbell_notifier=info,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Draftbell API server...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    let wake = match create_redis_pool(&config.redis_url).await {
        Ok(redis) => Some(WakeSignal::new(redis)),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, worker wake signal disabled");
            None
        }
    };

    let senders = SenderRegistry::from_config(&config)?;
    let port = config.api_port;

    let state = AppState::new(
        Arc::new(PgOutboxStore::new(pool.clone())),
        Arc::new(PgProfileStore::new(pool)),
        senders,
        wake,
        config,
    );

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
