//! Time-windowed retry budgets.
//!
//! A budget caps how many retries may be issued within a trailing window.
//! The registry keeps one budget per endpoint plus a shared global budget;
//! a retry needs a slot from both.

mod registry;

#[cfg(test)]
mod tests;

pub use registry::{BudgetScope, RetryBudgetRegistry, GLOBAL_BUDGET_KEY};

use bulwark_types::{BudgetStats, RetryBudgetConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::window::EventWindow;

#[derive(Debug)]
struct BudgetInner {
    attempts: EventWindow,
    exhaustion_count: u64,
    last_exhausted_at: Option<u64>,
}

impl BudgetInner {
    fn new(config: &RetryBudgetConfig) -> Self {
        Self {
            attempts: EventWindow::new(config.window_ms, config.max_retries as usize),
            exhaustion_count: 0,
            last_exhausted_at: None,
        }
    }
}

#[derive(Debug)]
pub struct RetryBudget {
    name: String,
    config: RetryBudgetConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BudgetInner>,
}

impl RetryBudget {
    pub fn new(name: impl Into<String>, config: RetryBudgetConfig, clock: Arc<dyn Clock>) -> Self {
        Self { name: name.into(), inner: Mutex::new(BudgetInner::new(&config)), config, clock }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RetryBudgetConfig {
        &self.config
    }

    /// True while fewer than `max_retries` slots were used in the trailing window.
    pub fn can_retry(&self) -> bool {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.attempts.count(now) < self.config.max_retries as usize
    }

    /// Take a slot. The check and the append happen under one lock.
    pub fn consume(&self) -> bool {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        let used = inner.attempts.count(now);
        if used >= self.config.max_retries as usize {
            inner.exhaustion_count += 1;
            inner.last_exhausted_at = Some(now);
            warn!(
                budget = %self.name,
                used,
                max_retries = self.config.max_retries,
                window_ms = self.config.window_ms,
                "Retry budget exhausted"
            );
            return false;
        }

        inner.attempts.record(now);
        true
    }

    pub fn stats(&self) -> BudgetStats {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let used = inner.attempts.count(now);
        let remaining = (self.config.max_retries as usize).saturating_sub(used);

        BudgetStats {
            used_in_window: used,
            max_retries: self.config.max_retries,
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
            window_ms: self.config.window_ms,
            exhaustion_count: inner.exhaustion_count,
            ms_since_exhausted: inner.last_exhausted_at.map(|t| now.saturating_sub(t)),
        }
    }

    pub fn reset(&self) {
        *self.inner.lock() = BudgetInner::new(&self.config);
    }
}
