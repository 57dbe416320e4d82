//! Shared configuration, infrastructure handles, errors and domain types.

pub mod config;
pub mod db;
pub mod error;
pub mod redis_pool;
pub mod types;
