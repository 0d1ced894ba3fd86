//! Discovery error domain, mirroring the teacher's `SwitchError` ->
//! `SparkError` conversion shape with a `From<DiscoveryError> for FleetError`
//! so callers can propagate with `?` straight into the shared taxonomy.

use fleetctl_core::error::FleetError;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no instances registered for service `{service}`")]
    NoInstances { service: String },

    #[error("backend lookup failed for service `{service}`: {detail}")]
    BackendUnavailable { service: String, detail: String },
}

impl From<DiscoveryError> for FleetError {
    fn from(value: DiscoveryError) -> Self {
        match value {
            DiscoveryError::NoInstances { service } => {
                FleetError::not_found("discovery.no_instances", format!("no instances registered for `{service}`"))
            }
            DiscoveryError::BackendUnavailable { service, detail } => {
                FleetError::transient("discovery.backend_unavailable", format!("{service}: {detail}"))
            }
        }
    }
}
