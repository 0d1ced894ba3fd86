//! The heartbeat wire payload and its config hash (spec §3 `HeartbeatPayload`,
//! §4.1 `ConfigHash`), kept in `fleetctl-core` rather than the producer crate
//! since the consumer, broker encoding and projection store all need the
//! same value type without depending on the producer's discovery/transport
//! stack — the same "kernel type, many satellite consumers" shape the
//! teacher uses for `kernel::types`.

use crate::error::{FleetError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Immutable heartbeat value (spec §3). `serviceName`/`instanceId` must be
/// non-empty; the partition key used by the broker is `serviceName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub service_name: String,
    pub instance_id: String,
    pub config_hash: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub observed_at: DateTime<Utc>,
}

impl HeartbeatPayload {
    /// Builder-style constructor enforcing non-empty `service_name`/
    /// `instance_id` at construction (spec §3 invariant).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        config_hash: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        environment: impl Into<String>,
        version: impl Into<String>,
        metadata: BTreeMap<String, String>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let service_name = service_name.into();
        let instance_id = instance_id.into();
        if service_name.trim().is_empty() {
            return Err(FleetError::validation("heartbeat.empty_service_name", "serviceName must not be empty"));
        }
        if instance_id.trim().is_empty() {
            return Err(FleetError::validation("heartbeat.empty_instance_id", "instanceId must not be empty"));
        }
        Ok(Self {
            service_name,
            instance_id,
            config_hash: config_hash.into(),
            host: host.into(),
            port,
            environment: environment.into(),
            version: version.into(),
            metadata,
            observed_at,
        })
    }

    /// The broker partition key for this payload: `serviceName` (spec §3).
    pub fn partition_key(&self) -> &str {
        &self.service_name
    }
}

/// Substring markers that exclude a property key from the config hash (spec
/// §4.1): checked against the lowercased key.
const REDACTED_KEY_MARKERS: [&str; 4] = ["password", "secret", "token", "credential"];

/// Computes the config hash placed in a heartbeat payload (spec §4.1):
/// SHA-256 over `key=value\n` lines, keys sorted lexicographically,
/// excluding any key whose lowercased form contains a redacted marker.
/// Returns `"NA"` on a digest error (unreachable with `sha2`'s infallible
/// API, but specified for parity with the fallible source behavior).
pub fn compute_config_hash(properties: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    let mut any = false;
    for (key, value) in properties {
        let lowered = key.to_lowercase();
        if REDACTED_KEY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            continue;
        }
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
        any = true;
    }
    let _ = any;
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_keys_are_excluded_from_the_hash() {
        let mut with_secret = BTreeMap::new();
        with_secret.insert("hostname".to_string(), "h1".to_string());
        with_secret.insert("db.password".to_string(), "hunter2".to_string());

        let mut without_secret = BTreeMap::new();
        without_secret.insert("hostname".to_string(), "h1".to_string());

        assert_eq!(compute_config_hash(&with_secret), compute_config_hash(&without_secret));
    }

    #[test]
    fn hash_is_stable_regardless_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());

        let mut b = BTreeMap::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());

        assert_eq!(compute_config_hash(&a), compute_config_hash(&b));
    }

    #[test]
    fn hash_is_lowercase_hex() {
        let mut props = BTreeMap::new();
        props.insert("hostname".to_string(), "h1".to_string());
        let hash = compute_config_hash(&props);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn construction_rejects_empty_identifiers() {
        let err = HeartbeatPayload::new("", "i1", "NA", "h", 8080, "prod", "1.0.0", BTreeMap::new(), Utc::now()).unwrap_err();
        assert_eq!(err.code(), "heartbeat.empty_service_name");
    }
}
