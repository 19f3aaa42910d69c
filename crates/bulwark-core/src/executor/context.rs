use bulwark_types::ErrorKind;
use serde::Serialize;
use std::sync::Arc;

use super::outcome::{RetryError, RetryOutcome};
use crate::backoff::DelaySource;
use crate::policy::{OperationKind, RetryPolicy};

/// State of one call loop. Created at loop start, dropped when it returns.
#[derive(Debug)]
pub(crate) struct RetryContext<'a> {
    pub endpoint: &'a str,
    pub operation: OperationKind,
    pub policy: Arc<RetryPolicy>,
    /// 0-based index of the attempt about to run
    pub attempt: u32,
    pub total_delay_ms: u64,
}

impl<'a> RetryContext<'a> {
    pub fn new(endpoint: &'a str, operation: OperationKind, policy: Arc<RetryPolicy>) -> Self {
        Self { endpoint, operation, policy, attempt: 0, total_delay_ms: 0 }
    }

    pub fn is_last_attempt(&self) -> bool {
        self.attempt.saturating_add(1) >= self.policy.max_attempts
    }

    pub fn finish<T, E>(&self, result: Result<T, RetryError<E>>, attempts: u32) -> RetryOutcome<T, E> {
        RetryOutcome { result, attempts, total_delay_ms: self.total_delay_ms }
    }
}

/// Passed to the retry listener before each backoff sleep.
#[derive(Debug, Clone, Serialize)]
pub struct RetryEvent {
    pub endpoint: String,
    pub operation: OperationKind,
    /// Attempts made so far
    pub attempt: u32,
    pub error_kind: ErrorKind,
    pub delay_ms: u64,
    pub delay_source: DelaySource,
    /// Cumulative delay including this sleep
    pub total_delay_ms: u64,
}
