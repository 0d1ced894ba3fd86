use fleetctl_core::error::FleetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalBackendError {
    #[error("approval backend failure for request {request_id}: {detail}")]
    Backend { request_id: String, detail: String },
}

impl From<ApprovalBackendError> for FleetError {
    fn from(err: ApprovalBackendError) -> Self {
        match err {
            ApprovalBackendError::Backend { request_id, detail } => FleetError::transient("approval.backend_unavailable", format!("{request_id}: {detail}")),
        }
    }
}
