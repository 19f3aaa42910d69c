//! Bounded trailing-window event log.
//!
//! Timestamps come from a monotonic clock, so the deque stays sorted and
//! expired entries are always at the front. An event recorded at `t` counts
//! while `now - t < window_ms`.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub(crate) struct EventWindow {
    events: VecDeque<u64>,
    window_ms: u64,
    capacity: usize,
}

impl EventWindow {
    /// `capacity` must be at least the largest threshold compared against
    /// [`count`](Self::count); older entries beyond it are dropped first.
    pub fn new(window_ms: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity.min(64)), window_ms, capacity }
    }

    pub fn record(&mut self, now_ms: u64) {
        self.prune(now_ms);
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(now_ms);
    }

    pub fn count(&mut self, now_ms: u64) -> usize {
        self.prune(now_ms);
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn prune(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.events.front() {
            if now_ms.saturating_sub(oldest) >= self.window_ms {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}
