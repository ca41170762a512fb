//! Time source abstraction.
//!
//! The engine never reads the wall clock directly; callers inject a `Clock`
//! so that `at` timestamps are reproducible under test and deterministic
//! across replay.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: ticks forward by a fixed step on every call.
pub struct StepClock {
    start: DateTime<Utc>,
    step: chrono::Duration,
    calls: std::sync::atomic::AtomicI64,
}

impl StepClock {
    pub fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self { start, step, calls: std::sync::atomic::AtomicI64::new(0) }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.start + self.step * (n as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_clock_is_non_decreasing() {
        let clock = StepClock::new(Utc::now(), chrono::Duration::seconds(1));
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
