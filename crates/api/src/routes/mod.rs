pub mod health;
pub mod notifications;
pub mod outbox;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .merge(outbox::router())
        .merge(webhooks::router())
        .with_state(state)
}
