//! Long-running outbox worker process.

pub mod runner;
