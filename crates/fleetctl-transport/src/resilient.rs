//! Wraps any `Transport` with the full resilience decorator stack (spec
//! §4.3): "all wrapped by the resilience decorator stack from
//! `fleetctl-core::governance` before any network call leaves the process."

use crate::protocol::EndpointAddress;
use crate::Transport;
use async_trait::async_trait;
use fleetctl_core::error::Result;
use fleetctl_core::governance::breaker::CircuitBreaker;
use fleetctl_core::governance::bulkhead::Bulkhead;
use fleetctl_core::governance::retry::{RetryBudget, RetryPolicy};
use fleetctl_core::governance::ResilientCall;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Shared governance primitives for one protected operation (spec §4.3
/// names these per-breaker/per-bulkhead, not global singletons, so callers
/// own one `GovernanceHandles` per logical target).
pub struct GovernanceHandles {
    pub breaker: Arc<CircuitBreaker>,
    pub retry_policy: RetryPolicy,
    pub retry_budget: Arc<RetryBudget>,
    pub bulkhead: Arc<Bulkhead>,
    pub time_limit: Duration,
}

pub struct ResilientTransport<T: Transport> {
    inner: T,
    handles: GovernanceHandles,
}

impl<T: Transport> ResilientTransport<T> {
    pub fn new(inner: T, handles: GovernanceHandles) -> Self {
        Self { inner, handles }
    }
}

#[async_trait]
impl<T: Transport> Transport for ResilientTransport<T> {
    async fn send(&self, address: &EndpointAddress, payload: &Value) -> Result<()> {
        let call = ResilientCall::new()
            .circuit_breaker(self.handles.breaker.clone())
            .retry(self.handles.retry_policy, self.handles.retry_budget.clone())
            .bulkhead(self.handles.bulkhead.clone())
            .time_limit(self.handles.time_limit);

        call.call(|| self.inner.send(address, payload)).await
    }
}
