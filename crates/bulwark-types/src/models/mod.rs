//! Configuration and introspection models.

mod config;
mod stats;

pub use config::{
    CircuitBreakerConfig, EndpointOverride, PolicyDefaults, PolicyName, ResilienceConfig,
    RetryBudgetConfig, GLOBAL_BUDGET_MULTIPLIER,
};
pub use stats::{BudgetStats, CircuitBreakerStats, CircuitBreakerSummary, CircuitState};
