//! Retry scheduling.

use std::time::Duration;

use serde::Serialize;

use crate::classifier::ErrorClass;

/// Delay before the next attempt, given the attempt count after the failed attempt.
///
/// 1 → 1 min, 2 → 5 min, 3 → 15 min, 4 and later → 1 hour.
pub fn backoff_delay(attempt_count: u32) -> Duration {
    let secs = match attempt_count {
        0 | 1 => 60,
        2 => 300,
        3 => 900,
        _ => 3600,
    };
    Duration::from_secs(secs)
}

/// Why a record ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermanentError,
    MaxAttemptsReached,
    /// The destination could not be resolved at dispatch time.
    Unresolvable,
    /// Processing the record raised an error outside the sender outcome.
    UnexpectedError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PermanentError => "permanent_error",
            FailureReason::MaxAttemptsReached => "max_attempts_reached",
            FailureReason::Unresolvable => "unresolvable",
            FailureReason::UnexpectedError => "unexpected_error",
        }
    }
}

/// What to do with a record after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp { reason: FailureReason },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// `attempt_count` includes the attempt that just failed.
    pub fn decide(&self, attempt_count: u32, class: ErrorClass) -> RetryDecision {
        match class {
            ErrorClass::Permanent => RetryDecision::GiveUp {
                reason: FailureReason::PermanentError,
            },
            ErrorClass::Transient if attempt_count >= self.max_attempts => RetryDecision::GiveUp {
                reason: FailureReason::MaxAttemptsReached,
            },
            ErrorClass::Transient => RetryDecision::Retry {
                delay: backoff_delay(attempt_count),
            },
        }
    }
}
