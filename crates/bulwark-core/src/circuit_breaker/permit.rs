//! RAII permit for one admitted attempt.

use tracing::debug;

use super::breaker::{Admission, CircuitBreaker};

/// One call admitted by a [`CircuitBreaker`].
///
/// Settle it with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropped unsettled, it reports the attempt as abandoned, so a HALF_OPEN
/// probe whose future was cancelled does not hold its slot forever.
#[derive(Debug)]
#[must_use = "an unsettled permit is recorded as an abandoned attempt"]
pub struct AttemptPermit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl<'a> AttemptPermit<'a> {
    pub(super) fn new(breaker: &'a CircuitBreaker, admission: Admission) -> Self {
        Self { breaker, admission, settled: false }
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for AttemptPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(endpoint = self.breaker.endpoint(), admission = ?self.admission, "Attempt abandoned");
            self.breaker.record_abandoned(self.admission);
        }
    }
}
