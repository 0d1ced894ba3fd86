//! Liveness sweep (spec §3 lifecycle: "`consecutiveMisses` increments when
//! a scheduled sweep finds `now − lastSeen > missThreshold`; deleted after
//! `retirementThreshold`"), a `tokio::time::interval`-driven task grounded
//! on `fleetctl-heartbeat::scheduler::HeartbeatScheduler`'s cancellable-tick
//! shape.

use crate::store::ProjectionStore;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct ProjectionSweeper {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl ProjectionSweeper {
    pub fn spawn(store: Arc<dyn ProjectionStore>, tick: Duration, miss_threshold: ChronoDuration, retirement_threshold: ChronoDuration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_signal = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = ticker.tick() => sweep_once(store.as_ref(), miss_threshold, retirement_threshold).await,
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

impl Drop for ProjectionSweeper {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn sweep_once(store: &dyn ProjectionStore, miss_threshold: ChronoDuration, retirement_threshold: ChronoDuration) {
    let now = chrono::Utc::now();
    match store.sweep(now, miss_threshold, retirement_threshold).await {
        Ok(report) => {
            if report.missed > 0 || report.retired > 0 {
                tracing::info!(missed = report.missed, retired = report.retired, "projection.sweep.completed");
            }
        }
        Err(err) => tracing::warn!(error = %err, "projection.sweep.failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProjectionStore;
    use fleetctl_core::HeartbeatPayload;
    use std::collections::BTreeMap;

    #[tokio::test(start_paused = true)]
    async fn sweep_retires_a_stale_entry() {
        let store: Arc<dyn ProjectionStore> = Arc::new(InMemoryProjectionStore::new());
        let payload = HeartbeatPayload::new("svc-a", "svc-a-1", "hash", "h1", 8080, "prod", "1.0.0", BTreeMap::new(), chrono::Utc::now()).unwrap();
        store.upsert(payload, chrono::Utc::now()).await.unwrap();

        let sweeper = ProjectionSweeper::spawn(store.clone(), Duration::from_millis(5), ChronoDuration::milliseconds(10), ChronoDuration::milliseconds(20));
        tokio::time::advance(Duration::from_millis(30)).await;
        tokio::task::yield_now().await;
        sweeper.shutdown().await;

        assert!(store.get("svc-a-1").await.unwrap().is_none());
    }
}
