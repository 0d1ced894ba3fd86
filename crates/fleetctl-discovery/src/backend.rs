//! `DiscoveryBackend` is the collaborator boundary named in spec §1/§9 (no
//! discovery-registry reimplementation): this crate only defines the trait
//! the real registry (Consul, DNS-SD, a gossip ring, ...) implements, plus an
//! in-memory stand-in used by tests and local development.

use crate::error::DiscoveryError;
use crate::registry::ServiceInstance;
use async_trait::async_trait;
use dashmap::DashMap;

/// Resolves the current set of healthy instances for a service name. A
/// refresh cycle produces a fresh, effectively-immutable snapshot (spec §5);
/// implementations are not expected to support incremental updates.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    async fn lookup(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DiscoveryError>;
}

/// A static, in-memory backend used by tests and by binaries running without
/// an external registry. Entries are seeded up front; `lookup` never fails.
#[derive(Debug, Default)]
pub struct StaticDiscoveryBackend {
    instances: DashMap<String, Vec<ServiceInstance>>,
}

impl StaticDiscoveryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service_name: impl Into<String>, instance: ServiceInstance) {
        self.instances.entry(service_name.into()).or_default().push(instance);
    }
}

#[async_trait]
impl DiscoveryBackend for StaticDiscoveryBackend {
    async fn lookup(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        Ok(self.instances.get(service_name).map(|entry| entry.clone()).unwrap_or_default())
    }
}
