//! The `ProjectionStore` trait (spec §6 "fleet projection store") and its
//! default in-process implementation.

use crate::model::{FleetProjectionEntry, SweepReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fleetctl_core::error::Result;
use fleetctl_core::HeartbeatPayload;

#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Creates or refreshes the entry for `payload.instance_id` (spec §3
    /// lifecycle: "created on first heartbeat; `lastSeen` updated on each
    /// batch").
    async fn upsert(&self, payload: HeartbeatPayload, now: DateTime<Utc>) -> Result<()>;

    async fn get(&self, instance_id: &str) -> Result<Option<FleetProjectionEntry>>;

    /// Increments `consecutiveMisses` for entries past `miss_threshold` and
    /// deletes entries past `retirement_threshold` (spec §3 lifecycle).
    async fn sweep(&self, now: DateTime<Utc>, miss_threshold: chrono::Duration, retirement_threshold: chrono::Duration) -> Result<SweepReport>;

    /// Snapshot of every live entry, used by the `/status/cache`-adjacent
    /// fleet listing route and by tests.
    async fn all(&self) -> Result<Vec<FleetProjectionEntry>>;
}

/// `DashMap`-backed projection store: the default backend, and the one used
/// by the consumer's contract tests (spec §8).
#[derive(Default)]
pub struct InMemoryProjectionStore {
    entries: DashMap<String, FleetProjectionEntry>,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn upsert(&self, payload: HeartbeatPayload, now: DateTime<Utc>) -> Result<()> {
        self.entries
            .entry(payload.instance_id.clone())
            .and_modify(|entry| entry.apply_heartbeat(payload.clone(), now))
            .or_insert_with(|| FleetProjectionEntry::from_payload(payload, now));
        Ok(())
    }

    async fn get(&self, instance_id: &str) -> Result<Option<FleetProjectionEntry>> {
        Ok(self.entries.get(instance_id).map(|entry| entry.clone()))
    }

    async fn sweep(&self, now: DateTime<Utc>, miss_threshold: chrono::Duration, retirement_threshold: chrono::Duration) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut retire = Vec::new();

        for mut entry in self.entries.iter_mut() {
            let age = now - entry.last_seen;
            if age > retirement_threshold {
                retire.push(entry.key().clone());
                continue;
            }
            if age > miss_threshold {
                entry.consecutive_misses += 1;
                report.missed += 1;
            }
        }

        for instance_id in retire {
            self.entries.remove(&instance_id);
            report.retired += 1;
        }

        Ok(report)
    }

    async fn all(&self) -> Result<Vec<FleetProjectionEntry>> {
        Ok(self.entries.iter().map(|entry| entry.clone()).collect())
    }
}
