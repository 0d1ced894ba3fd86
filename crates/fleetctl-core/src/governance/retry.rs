//! Retry policy and retry budget (spec §4.3 item 4, §8 "Budget bound").
//!
//! The backoff curve here is a fixed exponential-with-jitter schedule, not
//! the teacher's load/RTT-adaptive formula (`spark_core::governance::retry::
//! adaptive`) — this workspace has no per-call RTT telemetry to feed that
//! formula, so it keeps the simpler, spec-mandated `initial * multiplier^n`
//! schedule but reuses the teacher's deterministic SplitMix64 jitter trick
//! so retry timing stays reproducible in tests.

use crate::error::ErrorCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    /// Jitter factor in `[0, 1]`; the realized delay is uniform in
    /// `[delay * (1 - f), delay * (1 + f)]` (spec §4.3).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            jitter_factor: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Computes the backoff duration before the given 1-indexed attempt
    /// number, with deterministic jitter seeded from the attempt index so
    /// the same policy+attempt always produces the same test-observable
    /// delay.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let seed = split_mix64(attempt as u64 ^ base.to_bits());
        let unit = (seed >> 11) as f64 / (1u64 << 53) as f64; // in [0, 1)
        let jitter = 1.0 + (unit * 2.0 - 1.0) * self.jitter_factor.clamp(0.0, 1.0);
        Duration::from_secs_f64((base * jitter).max(0.0))
    }
}

#[inline]
fn split_mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}

/// Returns whether `category` is eligible for the retry decorator (spec
/// §4.3: network timeouts, connection refused, I/O errors, broker
/// connection failures; everything else is terminal).
pub fn is_retryable(category: ErrorCategory) -> bool {
    category == ErrorCategory::Retryable
}

/// A fixed-size ring of request/retry counts, used to bound the fraction of
/// calls that are retries within a rolling window (spec §8 "Budget bound":
/// `retries <= ceil(W * B / 100)`).
struct SlidingWindow {
    requests: Vec<u64>,
    retries: Vec<u64>,
    cursor: usize,
}

impl SlidingWindow {
    fn new(buckets: usize) -> Self {
        Self { requests: vec![0; buckets], retries: vec![0; buckets], cursor: 0 }
    }

    fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.requests.len();
        self.requests[self.cursor] = 0;
        self.retries[self.cursor] = 0;
    }

    fn record_request(&mut self) {
        self.requests[self.cursor] += 1;
    }

    fn record_retry(&mut self) {
        self.retries[self.cursor] += 1;
    }

    fn totals(&self) -> (u64, u64) {
        (self.requests.iter().sum(), self.retries.iter().sum())
    }
}

/// Caps the fraction of calls within a sliding window that may be retries
/// (spec §4.3 item 4, §8 "Budget bound"). Guarded by a `RwLock` rather than
/// an atomic array since admission requires a consistent read of both
/// counters together.
pub struct RetryBudget {
    window: RwLock<SlidingWindow>,
    max_retry_percentage: f32,
    tick_counter: AtomicU64,
    requests_per_bucket_rotation: u64,
}

impl RetryBudget {
    pub fn new(max_retry_percentage: f32, buckets: usize) -> Self {
        Self {
            window: RwLock::new(SlidingWindow::new(buckets.max(1))),
            max_retry_percentage,
            tick_counter: AtomicU64::new(0),
            requests_per_bucket_rotation: 50,
        }
    }

    /// Called once per attempt (first try and retries alike), per spec's
    /// "RecordRequest" decorator.
    pub fn record_request(&self) {
        let tick = self.tick_counter.fetch_add(1, Ordering::Relaxed);
        let mut window = self.window.write().expect("retry budget lock poisoned");
        if tick % self.requests_per_bucket_rotation == 0 {
            window.advance();
        }
        window.record_request();
    }

    /// Admits a retry iff `retries_in_window / requests_in_window <=
    /// max_retry_percentage`; denial is recorded as `retry.budget.rejected`
    /// by the caller.
    pub fn try_consume_retry(&self) -> bool {
        let mut window = self.window.write().expect("retry budget lock poisoned");
        let (requests, retries) = window.totals();
        if requests == 0 {
            window.record_retry();
            return true;
        }
        let projected = (retries + 1) as f64 / requests as f64 * 100.0;
        if projected <= self.max_retry_percentage as f64 {
            window.record_retry();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        let first = policy.backoff_for(1);
        let second = policy.backoff_for(2);
        assert!(first.as_secs_f64() >= policy.initial_delay.as_secs_f64() * 0.5);
        assert!(second.as_secs_f64() > first.as_secs_f64() * 0.5);
    }

    #[test]
    fn budget_denies_once_percentage_exceeded() {
        let budget = RetryBudget::new(20.0, 8);
        for _ in 0..10 {
            budget.record_request();
        }
        assert!(budget.try_consume_retry());
        assert!(!budget.try_consume_retry());
    }

    #[test]
    fn budget_bound_holds_over_a_window() {
        let budget = RetryBudget::new(20.0, 4);
        let w = 100;
        for _ in 0..w {
            budget.record_request();
        }
        let mut retries = 0u32;
        for _ in 0..w {
            if budget.try_consume_retry() {
                retries += 1;
            }
        }
        let bound = ((w as f64) * 20.0 / 100.0).ceil() as u32;
        assert!(retries <= bound, "retries {retries} exceeded bound {bound}");
    }
}
