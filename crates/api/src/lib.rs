//! Draftbell HTTP API.
//!
//! - `POST /api/notifications` enqueue a notification
//! - `GET  /api/notifications/{id}` record and audit history
//! - `POST /api/outbox/process` one claim-and-dispatch invocation
//! - `POST /api/outbox/recover` one stale-lock recovery sweep
//! - `POST /webhooks/telnyx` SMS delivery reports

pub mod middleware;
pub mod routes;
pub mod state;
