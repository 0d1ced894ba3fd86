//! The static facts about this process that every heartbeat carries (spec
//! §3): everything in a `HeartbeatPayload` except `configHash`/`observedAt`,
//! which are computed fresh on every send.

use fleetctl_core::ids::{InstanceId, ServiceName};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct HeartbeatDescriptor {
    pub service_name: ServiceName,
    pub instance_id: InstanceId,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub version: String,
    pub properties: BTreeMap<String, String>,
}
