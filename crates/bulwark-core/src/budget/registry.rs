use bulwark_types::{BudgetStats, RetryBudgetConfig};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::RetryBudget;
use crate::clock::{Clock, SystemClock};
use crate::telemetry;

/// Stats key under which the global budget is reported.
pub const GLOBAL_BUDGET_KEY: &str = "*";

/// Which budget denied a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    Global,
    Endpoint,
}

impl BudgetScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Endpoint => "endpoint",
        }
    }
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns per-endpoint retry budgets and the shared global budget.
#[derive(Debug)]
pub struct RetryBudgetRegistry {
    default_config: RetryBudgetConfig,
    overrides: HashMap<String, RetryBudgetConfig>,
    budgets: DashMap<String, Arc<RetryBudget>>,
    global: Arc<RetryBudget>,
    clock: Arc<dyn Clock>,
}

impl Default for RetryBudgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryBudgetRegistry {
    pub fn new() -> Self {
        Self::with_config(RetryBudgetConfig::default())
    }

    pub fn with_config(config: RetryBudgetConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// The global budget gets `3 × config.max_retries` over the same window.
    pub fn with_clock(config: RetryBudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let global = Arc::new(RetryBudget::new(GLOBAL_BUDGET_KEY, config.global(), Arc::clone(&clock)));
        Self { default_config: config, overrides: HashMap::new(), budgets: DashMap::new(), global, clock }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<String, RetryBudgetConfig>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config_for(&self, endpoint: &str) -> RetryBudgetConfig {
        self.overrides.get(endpoint).copied().unwrap_or(self.default_config)
    }

    pub fn get(&self, endpoint: &str) -> Arc<RetryBudget> {
        if let Some(existing) = self.budgets.get(endpoint) {
            return Arc::clone(existing.value());
        }
        let entry = self.budgets.entry(endpoint.to_string()).or_insert_with(|| {
            Arc::new(RetryBudget::new(endpoint, self.config_for(endpoint), Arc::clone(&self.clock)))
        });
        Arc::clone(entry.value())
    }

    pub fn global(&self) -> &Arc<RetryBudget> {
        &self.global
    }

    /// Whether both the global and the endpoint budget currently have room.
    ///
    /// Read-only: an endpoint without a budget yet is judged by its config.
    pub fn can_retry(&self, endpoint: &str) -> bool {
        let endpoint_has_room = self
            .budgets
            .get(endpoint)
            .map_or_else(|| self.config_for(endpoint).max_retries > 0, |budget| budget.can_retry());
        self.global.can_retry() && endpoint_has_room
    }

    /// Spend one retry slot from the global budget, then from the endpoint budget.
    ///
    /// A global slot taken before the endpoint budget refuses is not given
    /// back. Under combined load this errs toward retrying less.
    pub fn try_consume(&self, endpoint: &str) -> Result<(), BudgetScope> {
        if !self.global.consume() {
            telemetry::record_budget_exhausted(endpoint, BudgetScope::Global.as_str());
            return Err(BudgetScope::Global);
        }
        if !self.get(endpoint).consume() {
            telemetry::record_budget_exhausted(endpoint, BudgetScope::Endpoint.as_str());
            return Err(BudgetScope::Endpoint);
        }
        Ok(())
    }

    /// Per-endpoint stats plus the global budget under [`GLOBAL_BUDGET_KEY`].
    pub fn stats(&self) -> HashMap<String, BudgetStats> {
        let mut stats: HashMap<String, BudgetStats> =
            self.budgets.iter().map(|entry| (entry.key().clone(), entry.value().stats())).collect();
        stats.insert(GLOBAL_BUDGET_KEY.to_string(), self.global.stats());
        stats
    }

    pub fn reset_all(&self) {
        self.global.reset();
        for entry in self.budgets.iter() {
            entry.value().reset();
        }
    }
}
