//! Error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of failure observed on an outbound call.
///
/// Upstream kinds are produced by the collaborator that classifies transport
/// and protocol errors. `CircuitOpen` and `BudgetExhausted` are synthetic:
/// the executor raises them itself without invoking the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Credentials rejected (401/403)
    Auth,
    /// Connection refused, reset, DNS failure
    Network,
    /// Request or connect deadline elapsed
    Timeout,
    /// Upstream throttled the caller (429)
    RateLimit,
    /// Upstream 5xx
    Server,
    /// Bad input (4xx other than auth/not-found/rate-limit)
    Client,
    /// Requested resource does not exist
    NotFound,
    /// Response violated the expected schema
    Schema,
    /// Response body could not be decoded
    Format,
    /// Executor refused the attempt because the breaker is open
    CircuitOpen,
    /// Executor refused the retry because a retry budget is spent
    BudgetExhausted,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Auth,
        Self::Network,
        Self::Timeout,
        Self::RateLimit,
        Self::Server,
        Self::Client,
        Self::NotFound,
        Self::Schema,
        Self::Format,
        Self::CircuitOpen,
        Self::BudgetExhausted,
    ];

    /// Kinds the default policies retry.
    pub const DEFAULT_RETRIABLE: [Self; 4] =
        [Self::RateLimit, Self::Network, Self::Timeout, Self::Server];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate-limit",
            Self::Server => "server",
            Self::Client => "client",
            Self::NotFound => "not-found",
            Self::Schema => "schema",
            Self::Format => "format",
            Self::CircuitOpen => "circuit-open",
            Self::BudgetExhausted => "budget-exhausted",
        }
    }

    /// True for kinds raised by the executor rather than by the upstream.
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Self::CircuitOpen | Self::BudgetExhausted)
    }

    pub const fn is_retriable_by_default(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Timeout | Self::Server)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
