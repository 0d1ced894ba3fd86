use fleetctl_core::error::FleetError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request to `{url}` failed: {detail}")]
    Http { url: String, detail: String },

    #[error("endpoint metadata missing required key `{key}`")]
    MissingMetadata { key: String },
}

impl From<TransportError> for FleetError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Http { url, detail } => {
                FleetError::transient("transport.http_failure", format!("{url}: {detail}"))
            }
            TransportError::MissingMetadata { key } => {
                FleetError::validation("transport.missing_metadata", format!("missing metadata key `{key}`"))
            }
        }
    }
}
