//! Backoff sleep seam.
//!
//! The sleep before a retry is the only suspension point inside the retry
//! loop. Production code waits on the tokio timer; tests swap in
//! [`RecordingSleeper`] to observe the requested delays without waiting.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;

#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Records every requested delay and, when attached to a [`ManualClock`],
/// advances it by the same amount instead of waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    clock: Option<Arc<ManualClock>>,
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self { clock: Some(clock), delays: Mutex::new(Vec::new()) }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().push(delay);
        if let Some(clock) = &self.clock {
            clock.advance_ms(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
        }
        tokio::task::yield_now().await;
    }
}
