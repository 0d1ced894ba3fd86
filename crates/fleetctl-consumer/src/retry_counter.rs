//! A stateful per-worker retry counter (spec §4.1 "a stateful retry counter
//! per worker increments"). One instance is owned by each consumer worker
//! task since each worker is constructed with its own broker handle and
//! therefore its own stable partition assignment.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
pub struct RetryCounter(AtomicU32);

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the new attempt count (1-indexed).
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn current(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Backoff before the worker's next attempt: `2^(attempt-1) * 1s` (spec
/// §4.1).
pub fn backoff_for(attempt: u32) -> std::time::Duration {
    let seconds = 2u64.saturating_pow(attempt.saturating_sub(1));
    std::time::Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_each_attempt() {
        assert_eq!(backoff_for(1), std::time::Duration::from_secs(1));
        assert_eq!(backoff_for(2), std::time::Duration::from_secs(2));
        assert_eq!(backoff_for(3), std::time::Duration::from_secs(4));
    }

    #[test]
    fn reset_returns_counter_to_zero() {
        let counter = RetryCounter::new();
        counter.increment();
        counter.increment();
        assert_eq!(counter.current(), 2);
        counter.reset();
        assert_eq!(counter.current(), 0);
    }
}
