//! Notification outbox: the durable queue of outbound messages and everything
//! that moves a record through it.
//!
//! 1. [`enqueue`] resolves the destination, checks consent and writes the record
//!    together with its first audit event
//! 2. [`worker`] atomically claims due records, dispatches them through the
//!    channel senders and applies the retry policy
//! 3. [`webhook`] reconciles provider delivery reports onto sent records
//!
//! Storage sits behind [`store::OutboxStore`] and [`profile::ProfileStore`], with
//! Postgres implementations for production and in-memory ones for tests.

pub mod audit;
pub mod backoff;
pub mod classifier;
pub mod enqueue;
pub mod profile;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod wake;
pub mod webhook;
pub mod worker;
