//! Per-attempt timeout (spec §4.3 item 6), the innermost decorator in the
//! resilience stack. Kept as its own type, rather than a bare
//! `tokio::time::timeout` call inlined everywhere, so callers outside
//! `ResilientCall` (e.g. a one-off transport call that wants a timeout but
//! none of the other decorators) can reuse the same error mapping.

use crate::error::{FleetError, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct TimeLimiter {
    limit: Duration,
}

impl TimeLimiter {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub async fn call<Fut, T>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(FleetError::Timeout {
                code: "resilience.timeout",
                detail: format!("exceeded {:?}", self.limit),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn times_out_slow_futures() {
        let limiter = TimeLimiter::new(Duration::from_millis(5));
        let result: Result<()> = limiter
            .call(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .await;
        assert_eq!(result.unwrap_err().code(), "resilience.timeout");
    }

    #[tokio::test]
    async fn passes_through_fast_futures() {
        let limiter = TimeLimiter::new(Duration::from_millis(50));
        let result: Result<u32> = limiter.call(async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
