//! Errors raised by the projection store backends, folded into
//! `FleetError::Transient` (retryable: a sweep or upsert can simply retry on
//! the next tick) per spec §7.

use fleetctl_core::error::FleetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("projection backend failure for instance {instance_id}: {detail}")]
    Backend { instance_id: String, detail: String },
}

impl From<ProjectionError> for FleetError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Backend { instance_id, detail } => {
                FleetError::transient("projection.backend_unavailable", format!("{instance_id}: {detail}"))
            }
        }
    }
}
