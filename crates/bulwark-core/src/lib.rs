//! # Bulwark Core
//!
//! Retry orchestration for outbound API calls.
//!
//! ## Layout
//!
//! ```text
//! bulwark-core/src/
//! ├── backoff/          # Exponential backoff, jitter, Retry-After parsing
//! ├── circuit_breaker/  # Per-endpoint breaker state machine + registry
//! ├── budget/           # Trailing-window retry budgets (endpoint + global)
//! ├── policy/           # Named policies, routing table, operation classifier
//! ├── executor/         # The attempt loop tying the above together
//! ├── clock.rs          # Monotonic + wall clock seam
//! ├── sleeper.rs        # Backoff sleep seam
//! ├── config.rs         # JSON config loading
//! └── logging.rs        # tracing subscriber bootstrap
//! ```
//!
//! Breakers and budgets live in registries owned by the executor (or shared
//! between executors by passing the same `Arc`). Nothing is global.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Breaker and budget guards cover the full read-modify-write sequence"
)]
#![allow(clippy::module_name_repetitions, reason = "CircuitBreakerRegistry reads better than Registry")]
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test code: panics are the assertion mechanism"
    )
)]

pub mod backoff;
pub mod budget;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod executor;
pub mod logging;
pub mod policy;
pub mod sleeper;

mod telemetry;
mod window;

pub use backoff::{BackoffCalculator, DelaySource, FixedJitter, JitterSource, RetryDelay, ThreadRngJitter};
pub use budget::{BudgetScope, RetryBudget, RetryBudgetRegistry, GLOBAL_BUDGET_KEY};
pub use circuit_breaker::{Admission, AttemptPermit, CircuitBreaker, CircuitBreakerRegistry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{
    Classify, RetryError, RetryEvent, RetryExecutor, RetryExecutorBuilder, RetryListener, RetryOutcome,
};
pub use policy::{
    classify_operation, derive_endpoint, is_retriable_error, OperationKind, RetryPolicy, RetryPolicyTable,
};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};

pub use bulwark_types::{ErrorKind, PolicyName, ResilienceConfig};
