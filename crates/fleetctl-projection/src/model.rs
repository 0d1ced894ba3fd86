//! The `FleetProjectionEntry` read model (spec §3) and the report returned
//! by a sweep pass.

use chrono::{DateTime, Utc};
use fleetctl_core::HeartbeatPayload;
use serde::{Deserialize, Serialize};

/// One row per `instanceId`, created on first heartbeat and updated on
/// every subsequent one (spec §3 "FleetProjection entry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetProjectionEntry {
    pub service_name: String,
    pub instance_id: String,
    pub last_seen: DateTime<Utc>,
    pub config_hash: String,
    pub last_payload: HeartbeatPayload,
    pub consecutive_misses: u32,
}

impl FleetProjectionEntry {
    pub fn from_payload(payload: HeartbeatPayload, now: DateTime<Utc>) -> Self {
        Self {
            service_name: payload.service_name.clone(),
            instance_id: payload.instance_id.clone(),
            last_seen: now,
            config_hash: payload.config_hash.clone(),
            last_payload: payload,
            consecutive_misses: 0,
        }
    }

    /// Applies a fresh heartbeat to an existing entry: `lastSeen` advances,
    /// `consecutiveMisses` resets to zero (spec §3 lifecycle).
    pub fn apply_heartbeat(&mut self, payload: HeartbeatPayload, now: DateTime<Utc>) {
        self.service_name = payload.service_name.clone();
        self.config_hash = payload.config_hash.clone();
        self.last_payload = payload;
        self.last_seen = now;
        self.consecutive_misses = 0;
    }
}

/// Summary of a single sweep pass, used by the server's scheduler for
/// logging/metrics and by tests asserting sweep behavior.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub missed: u32,
    pub retired: u32,
}
