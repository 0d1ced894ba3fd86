//! Concurrent instance registry and its resolve entry point, grounded on
//! `spark-switch`'s `applications::registrar` (a `dashmap`-backed map from a
//! logical name to the objects that serve it) generalized from call sessions
//! to service instances.

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::policy::{LoadBalancerPolicy, LoadBalancerPolicyKind, SelectionKey};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A transient handle to one running copy of a service (spec §3
/// `LoadBalancerInstance`). Owned by the discovery collaborator; callers
/// hold references only for the duration of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, instance_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self { service_id: service_id.into(), instance_id: instance_id.into(), host: host.into(), port, metadata: HashMap::new() }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-service snapshot cache refreshed from a `DiscoveryBackend`. Each
/// refresh replaces the whole `Vec` for a service rather than mutating it in
/// place, so a selection always sees a consistent list (spec §5).
#[derive(Default)]
pub struct InstanceRegistry {
    snapshots: DashMap<String, Arc<[ServiceInstance]>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, service_name: &str) -> Option<Arc<[ServiceInstance]>> {
        self.snapshots.get(service_name).map(|entry| entry.clone())
    }

    pub fn replace(&self, service_name: impl Into<String>, instances: Vec<ServiceInstance>) {
        self.snapshots.insert(service_name.into(), instances.into());
    }

    pub async fn refresh(&self, service_name: &str, backend: &dyn DiscoveryBackend) -> Result<(), DiscoveryError> {
        let instances = backend.lookup(service_name).await?;
        self.replace(service_name, instances);
        Ok(())
    }
}

/// Single entry point consumed by the heartbeat producer and by the
/// resilience-wrapped HTTP transport: resolves a service name to one
/// instance, refreshing the registry from the backend on a cache miss.
pub struct DiscoveryClient {
    registry: InstanceRegistry,
    backend: Arc<dyn DiscoveryBackend>,
    default_policy: LoadBalancerPolicyKind,
}

impl DiscoveryClient {
    pub fn new(backend: Arc<dyn DiscoveryBackend>, default_policy: LoadBalancerPolicyKind) -> Self {
        Self { registry: InstanceRegistry::new(), backend, default_policy }
    }

    /// Resolves one instance for `service_name`, using `policy_override` for
    /// this call when given, else the client's configured default (spec
    /// §4.5 "Policy selection is per-call or per-service").
    pub async fn resolve(
        &self,
        service_name: &str,
        key: &SelectionKey,
        policy_override: Option<LoadBalancerPolicyKind>,
    ) -> Result<ServiceInstance, DiscoveryError> {
        let mut snapshot = self.registry.snapshot(service_name);
        if snapshot.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            self.registry.refresh(service_name, self.backend.as_ref()).await?;
            snapshot = self.registry.snapshot(service_name);
        }
        let instances = snapshot.filter(|s| !s.is_empty()).ok_or_else(|| DiscoveryError::NoInstances {
            service: service_name.to_string(),
        })?;

        let policy = policy_override.unwrap_or(self.default_policy).build();
        policy
            .select(key, &instances)
            .cloned()
            .ok_or_else(|| DiscoveryError::NoInstances { service: service_name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StaticDiscoveryBackend;

    #[tokio::test]
    async fn resolves_after_a_cache_miss_triggers_a_refresh() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        backend.register("svc-a", ServiceInstance::new("svc-a", "svc-a-1", "h1", 8080));
        let client = DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin);

        let instance = client.resolve("svc-a", &SelectionKey::new("svc-a"), None).await.unwrap();
        assert_eq!(instance.instance_id, "svc-a-1");
    }

    #[tokio::test]
    async fn missing_service_surfaces_no_instances() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        let client = DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin);
        let err = client.resolve("svc-missing", &SelectionKey::new("svc-missing"), None).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoInstances { .. }));
    }
}
