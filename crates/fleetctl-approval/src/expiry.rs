//! Expiry sweep (spec §4.2 `expire`, §9 "sweep" design note): a
//! `tokio::time::interval`-driven task that scans every `Pending` request
//! and expires the ones past `expiry_window`, grounded on
//! `fleetctl-heartbeat::scheduler::HeartbeatScheduler`'s cancellable-tick
//! shape.

use crate::aggregate::ApprovalAggregate;
use fleetctl_core::error::FleetError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct ExpirySweeper {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawns the sweep loop; every `interval` tick lists pending requests
    /// and calls `expire` on each, logging and skipping any that have not
    /// yet crossed their expiry window (the common case).
    pub fn spawn(aggregate: Arc<ApprovalAggregate>, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_signal = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => sweep_once(&aggregate).await,
                    _ = shutdown_signal.notified() => break,
                }
            }
        });

        Self { shutdown, handle: Some(handle) }
    }

    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn sweep_once(aggregate: &ApprovalAggregate) {
    let now = chrono::Utc::now();
    let pending = match aggregate.list_pending().await {
        Ok(pending) => pending,
        Err(err) => {
            tracing::warn!(error = %err, "approval.expiry_sweep.list_failed");
            return;
        }
    };

    for request in pending {
        match aggregate.expire(&request.id, now).await {
            Ok(_) => tracing::info!(request_id = %request.id, "approval.expiry_sweep.expired"),
            Err(FleetError::Validation { code: "approval.not_yet_expired", .. }) => {}
            Err(err) => tracing::warn!(request_id = %request.id, error = %err, "approval.expiry_sweep.expire_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowAllAuthz;
    use crate::store::{InMemoryApprovalStore, InMemoryDecisionStore};
    use crate::types::{ApprovalTarget, DecisionSnapshot, RequestType};
    use chrono::Duration as ChronoDuration;
    use fleetctl_broker::InMemoryBroker;
    use fleetctl_core::ids::UserId;
    use fleetctl_core::model::RequestStatus;

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_a_request_past_its_window() {
        let aggregate = Arc::new(ApprovalAggregate::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(InMemoryDecisionStore::new()),
            Arc::new(AllowAllAuthz),
            Arc::new(InMemoryBroker::new(1)),
            ChronoDuration::milliseconds(10),
        ));
        let request = aggregate
            .create(UserId::from("requester"), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(20)).await;

        let sweeper = ExpirySweeper::spawn(aggregate.clone(), Duration::from_millis(5));
        tokio::time::advance(Duration::from_millis(15)).await;
        tokio::task::yield_now().await;
        sweeper.shutdown().await;

        let updated = aggregate.get(&request.id).await.unwrap().unwrap();
        assert_eq!(updated.status, RequestStatus::Expired);
    }
}
