//! Concurrency limiter (spec §4.3 item 5), a semaphore wrapped so that a
//! denied acquire maps onto the error taxonomy instead of leaking a raw
//! `AcquireError`.

use crate::error::{FleetError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct Bulkhead {
    name: String,
    semaphore: Semaphore,
    max_wait: Option<Duration>,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrent_calls: usize, max_wait: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            semaphore: Semaphore::new(max_concurrent_calls.max(1)),
            max_wait,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a permit, bounded by `max_wait` when configured. Bounded by
    /// the ambient deadline too when one is narrower than `max_wait`, so a
    /// queued caller never outlives its own request deadline.
    pub async fn acquire(&self) -> Result<BulkheadPermit<'_>> {
        let wait_budget = match (self.max_wait, crate::context::current().and_then(|d| d.remaining())) {
            (Some(configured), Some(ambient)) => Some(configured.min(ambient)),
            (Some(configured), None) => Some(configured),
            (None, Some(ambient)) => Some(ambient),
            (None, None) => None,
        };

        let permit = match wait_budget {
            Some(budget) => tokio::time::timeout(budget, self.semaphore.acquire())
                .await
                .map_err(|_| FleetError::BulkheadFull {
                    code: "resilience.bulkhead_full",
                    detail: self.name.clone(),
                })?
                .expect("bulkhead semaphore never closed"),
            None => self.semaphore.acquire().await.expect("bulkhead semaphore never closed"),
        };

        Ok(BulkheadPermit { _permit: permit })
    }
}

pub struct BulkheadPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

/// A bulkhead shared across tasks via `Arc`; most callers hold one of these
/// rather than owning a bare `Bulkhead`.
pub type SharedBulkhead = Arc<Bulkhead>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_the_configured_limit() {
        let bulkhead = Bulkhead::new("ingest", 2, None);
        let a = bulkhead.acquire().await.unwrap();
        let b = bulkhead.acquire().await.unwrap();
        assert_eq!(bulkhead.available_permits(), 0);
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn denies_beyond_max_wait() {
        let bulkhead = Bulkhead::new("ingest", 1, Some(Duration::from_millis(10)));
        let _held = bulkhead.acquire().await.unwrap();
        let err = bulkhead.acquire().await.unwrap_err();
        assert_eq!(err.code(), "resilience.bulkhead_full");
    }
}
