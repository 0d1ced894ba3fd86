//! Count-based sliding-window circuit breaker (spec §4.3 item 3), modeled
//! as an explicit state enum the way the teacher models `status::ReadyState`
//! rather than as booleans scattered across fields.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub sliding_window_size: usize,
    pub minimum_calls: usize,
    pub failure_rate_threshold: f32,
    pub slow_call_rate_threshold: f32,
    pub slow_call_duration: Duration,
    pub permitted_calls_in_half_open: usize,
    pub wait_duration_in_open_state: Duration,
    /// Whether this breaker's `Open` state should flip the process
    /// `HealthState` to `Down` (spec §4.3: "a critical breaker set").
    pub critical: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.8,
            slow_call_duration: Duration::from_secs(1),
            permitted_calls_in_half_open: 3,
            wait_duration_in_open_state: Duration::from_secs(30),
            critical: false,
        }
    }
}

#[derive(Clone, Copy)]
struct CallOutcome {
    failed: bool,
    slow: bool,
}

struct Window {
    slots: Vec<Option<CallOutcome>>,
    cursor: usize,
    filled: usize,
}

impl Window {
    fn new(size: usize) -> Self {
        Self { slots: vec![None; size.max(1)], cursor: 0, filled: 0 }
    }

    fn push(&mut self, outcome: CallOutcome) {
        self.slots[self.cursor] = Some(outcome);
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.filled = (self.filled + 1).min(self.slots.len());
    }

    fn rates(&self) -> (f32, f32, usize) {
        let total = self.filled;
        if total == 0 {
            return (0.0, 0.0, 0);
        }
        let mut failures = 0usize;
        let mut slow = 0usize;
        for slot in self.slots.iter().flatten() {
            if slot.failed {
                failures += 1;
            }
            if slot.slow {
                slow += 1;
            }
        }
        (failures as f32 / total as f32, slow as f32 / total as f32, total)
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.cursor = 0;
        self.filled = 0;
    }
}

/// A single named circuit breaker. Wrapped in `Arc` and shared across
/// callers of the same protected operation.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: AtomicU8,
    opened_at: Mutex<Option<Instant>>,
    window: Mutex<Window>,
    half_open_successes: AtomicUsize,
    half_open_calls_in_flight: AtomicUsize,
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            window: Mutex::new(Window::new(config.sliding_window_size)),
            config,
            state: AtomicU8::new(STATE_CLOSED),
            opened_at: Mutex::new(None),
            half_open_successes: AtomicUsize::new(0),
            half_open_calls_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Call before attempting the protected operation. Performs the
    /// automatic `Open -> HalfOpen` transition after the wait duration.
    pub fn allow_request(&self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                let in_flight = self.half_open_calls_in_flight.fetch_add(1, Ordering::AcqRel);
                if in_flight < self.config.permitted_calls_in_half_open {
                    true
                } else {
                    self.half_open_calls_in_flight.fetch_sub(1, Ordering::AcqRel);
                    false
                }
            }
            BreakerState::Open => {
                let mut opened_at = self.opened_at.lock().expect("breaker lock poisoned");
                if let Some(at) = *opened_at {
                    if at.elapsed() >= self.config.wait_duration_in_open_state {
                        *opened_at = None;
                        self.transition_to_half_open();
                        return self.allow_request();
                    }
                }
                false
            }
        }
    }

    /// Records the outcome of a call previously admitted by
    /// `allow_request`. `failed` collapses timeouts, terminal errors and
    /// slow calls are tracked separately via `record_timing`.
    pub fn record_outcome(&self, succeeded: bool) {
        self.record(succeeded, false);
    }

    /// Records outcome plus whether the call exceeded `slow_call_duration`,
    /// feeding the slow-call-rate half of the CLOSED -> OPEN transition.
    pub fn record_timing(&self, succeeded: bool, duration: Duration) {
        self.record(succeeded, duration >= self.config.slow_call_duration);
    }

    fn record(&self, succeeded: bool, slow: bool) {
        match self.state() {
            BreakerState::HalfOpen => {
                self.half_open_calls_in_flight.fetch_sub(1, Ordering::AcqRel);
                if succeeded {
                    let successes = self.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
                    if successes >= self.config.permitted_calls_in_half_open {
                        self.transition_to_closed();
                    }
                } else {
                    self.transition_to_open();
                }
            }
            _ => {
                let mut window = self.window.lock().expect("breaker lock poisoned");
                window.push(CallOutcome { failed: !succeeded, slow });
                let (failure_rate, slow_rate, total) = window.rates();
                if total >= self.config.minimum_calls
                    && (failure_rate >= self.config.failure_rate_threshold
                        || slow_rate >= self.config.slow_call_rate_threshold)
                {
                    drop(window);
                    self.transition_to_open();
                }
            }
        }
    }

    fn transition_to_open(&self) {
        self.state.store(STATE_OPEN, Ordering::Release);
        *self.opened_at.lock().expect("breaker lock poisoned") = Some(Instant::now());
        self.window.lock().expect("breaker lock poisoned").clear();
    }

    fn transition_to_half_open(&self) {
        self.half_open_successes.store(0, Ordering::Release);
        self.half_open_calls_in_flight.store(0, Ordering::Release);
        self.state.store(STATE_HALF_OPEN, Ordering::Release);
    }

    fn transition_to_closed(&self) {
        self.window.lock().expect("breaker lock poisoned").clear();
        self.state.store(STATE_CLOSED, Ordering::Release);
    }

    /// Whether this breaker being `Open` should flip process health to
    /// `Down` (spec §4.3).
    pub fn is_critical(&self) -> bool {
        self.config.critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_rate_threshold_crossed() {
        let breaker = CircuitBreaker::new("svc-a", BreakerConfig {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            ..Default::default()
        });
        for i in 0..10 {
            assert!(breaker.allow_request());
            breaker.record_outcome(i % 2 == 0);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn half_open_closes_after_sustained_success() {
        let breaker = CircuitBreaker::new("svc-a", BreakerConfig {
            wait_duration_in_open_state: Duration::from_millis(0),
            permitted_calls_in_half_open: 3,
            minimum_calls: 2,
            ..Default::default()
        });
        breaker.record_outcome(false);
        breaker.record_outcome(false);
        assert_eq!(breaker.state(), BreakerState::Open);

        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_outcome(true);
        assert!(breaker.allow_request());
        breaker.record_outcome(true);
        assert!(breaker.allow_request());
        breaker.record_outcome(true);

        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let breaker = CircuitBreaker::new("svc-a", BreakerConfig {
            wait_duration_in_open_state: Duration::from_millis(0),
            minimum_calls: 1,
            ..Default::default()
        });
        breaker.record_outcome(false);
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_outcome(false);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
