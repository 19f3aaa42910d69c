use bulwark_types::ErrorKind;
use thiserror::Error;

use crate::budget::BudgetScope;

/// Contract for errors returned by an operation run through the executor.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    /// Raw `Retry-After` value carried by the failure, if any.
    fn retry_after(&self) -> Option<&str> {
        None
    }
}

impl Classify for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

/// Error crossing the executor boundary.
///
/// `Upstream` is the operation's own error, returned as-is once retries
/// stop. The other variants are raised by the executor itself.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Upstream(E),

    #[error("Circuit open for {endpoint}, retry in {retry_in_ms}ms")]
    CircuitOpen { endpoint: String, retry_in_ms: u64 },

    /// Raised after a retriable failure when no retry slot was available.
    #[error("Retry budget exhausted for {endpoint} ({scope} scope): {last_error}")]
    BudgetExhausted { endpoint: String, scope: BudgetScope, last_error: E },
}

impl<E: Classify> RetryError<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Upstream(e) => e.kind(),
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::BudgetExhausted { .. } => ErrorKind::BudgetExhausted,
        }
    }
}

impl<E> RetryError<E> {
    pub const fn is_synthetic(&self) -> bool {
        !matches!(self, Self::Upstream(_))
    }

    /// The last upstream error, if the operation ran and failed.
    pub fn into_upstream(self) -> Option<E> {
        match self {
            Self::Upstream(e) | Self::BudgetExhausted { last_error: e, .. } => Some(e),
            Self::CircuitOpen { .. } => None,
        }
    }

    pub fn upstream(&self) -> Option<&E> {
        match self {
            Self::Upstream(e) | Self::BudgetExhausted { last_error: e, .. } => Some(e),
            Self::CircuitOpen { .. } => None,
        }
    }
}

/// Final result of one logical call.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, RetryError<E>>,
    /// Invocations of the operation, including the first
    pub attempts: u32,
    /// Sum of all backoff delays slept
    pub total_delay_ms: u64,
}

impl<T, E> RetryOutcome<T, E> {
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&RetryError<E>> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, RetryError<E>> {
        self.result
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RetryOutcome<U, E> {
        RetryOutcome { result: self.result.map(f), attempts: self.attempts, total_delay_ms: self.total_delay_ms }
    }
}
