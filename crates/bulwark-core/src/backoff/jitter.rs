use rand::Rng;
use std::fmt::Debug;

/// Source of uniform samples in `[0, 1)` used to spread retry delays.
pub trait JitterSource: Send + Sync + Debug {
    fn next_unit(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same sample. `0.5` yields zero jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(f64);

impl FixedJitter {
    pub fn new(unit: f64) -> Self {
        Self(unit.clamp(0.0, 1.0))
    }

    /// A source that leaves computed delays untouched.
    pub fn none() -> Self {
        Self(0.5)
    }
}

impl JitterSource for FixedJitter {
    fn next_unit(&self) -> f64 {
        self.0
    }
}
