//! Resilience fabric (spec §4.3): a decorator stack applied to every
//! outbound call. Each concern is its own small module the way the teacher
//! splits `governance::retry`, `governance::timeout` etc. rather than one
//! monolithic "resilience" type.

pub mod breaker;
pub mod bulkhead;
pub mod retry;
pub mod time_limiter;

use crate::context;
use crate::error::{FleetError, Result};
use breaker::CircuitBreaker;
use bulkhead::Bulkhead;
use retry::{RetryBudget, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Whether an operation may be safely retried. Only idempotent operations
/// (spec §4.3 item 4) should be wrapped with `.retry(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NotIdempotent,
}

/// Builds the outer-to-inner decorator stack described in spec §4.3:
/// `DeadlineCheck -> RecordRequest -> CircuitBreaker -> Retry -> Bulkhead ->
/// TimeLimiter -> inner call`.
pub struct ResilientCall {
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<(RetryPolicy, Arc<RetryBudget>)>,
    bulkhead: Option<Arc<Bulkhead>>,
    time_limit: Option<Duration>,
}

impl Default for ResilientCall {
    fn default() -> Self {
        Self { breaker: None, retry: None, bulkhead: None, time_limit: None }
    }
}

impl ResilientCall {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy, budget: Arc<RetryBudget>) -> Self {
        self.retry = Some((policy, budget));
        self
    }

    pub fn bulkhead(mut self, bulkhead: Arc<Bulkhead>) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Runs `op` through the full decorator stack. `op` is invoked once per
    /// attempt; it must be cheaply re-callable (an `Fn`, not `FnOnce`).
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // 1. DeadlineCheck — fail fast without touching the inner layers.
        if let Some(deadline) = context::current() {
            if deadline.has_elapsed() {
                return Err(FleetError::DeadlineExceeded {
                    code: "resilience.deadline_exceeded",
                    detail: "ambient deadline already elapsed".into(),
                });
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            // 2. RecordRequest — every attempt counts against the budget
            // window, retries or not.
            if let Some((_, budget)) = &self.retry {
                budget.record_request();
            }

            // 3. CircuitBreaker
            if let Some(breaker) = &self.breaker {
                if !breaker.allow_request() {
                    return Err(FleetError::CircuitOpen {
                        code: "resilience.circuit_open",
                        detail: breaker.name().to_string(),
                    });
                }
            }

            let attempt_result = self.call_once(&op).await;

            if let Some(breaker) = &self.breaker {
                breaker.record_outcome(attempt_result.is_ok());
            }

            match attempt_result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some((policy, budget)) = &self.retry else {
                        return Err(err);
                    };
                    if err.category() != crate::error::ErrorCategory::Retryable {
                        return Err(err);
                    }
                    if attempt >= policy.max_attempts {
                        return Err(err);
                    }
                    if !budget.try_consume_retry() {
                        return Err(FleetError::Transient {
                            code: "retry.budget.rejected",
                            detail: "retry budget exhausted".into(),
                        });
                    }
                    let delay = policy.backoff_for(attempt);
                    if !sleep_cancellable(delay).await {
                        return Err(FleetError::DeadlineExceeded {
                            code: "resilience.deadline_exceeded",
                            detail: "cancelled while waiting to retry".into(),
                        });
                    }
                }
            }
        }
    }

    async fn call_once<F, Fut, T>(&self, op: &F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // 5. Bulkhead
        let _permit = match &self.bulkhead {
            Some(bulkhead) => Some(bulkhead.acquire().await?),
            None => None,
        };

        // 6. TimeLimiter
        match self.time_limit {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(result) => result,
                Err(_) => Err(FleetError::Timeout {
                    code: "resilience.timeout",
                    detail: format!("exceeded {limit:?}"),
                }),
            },
            None => op().await,
        }
    }
}

/// A deadline-aware sleep: returns `false` if the ambient deadline elapses
/// (or is already elapsed) before `duration` passes, so retry/backoff waits
/// are always cancellable (spec §5).
async fn sleep_cancellable(duration: Duration) -> bool {
    match context::current().and_then(|d| d.remaining()) {
        Some(remaining) if remaining < duration => {
            tokio::time::sleep(remaining).await;
            false
        }
        _ => {
            tokio::time::sleep(duration).await;
            true
        }
    }
}

pub use retry::is_retryable;
