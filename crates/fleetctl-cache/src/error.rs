use fleetctl_core::error::FleetError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("distributed backend failure for key `{key}`: {detail}")]
    Backend { key: String, detail: String },

    #[error("serialization failure for key `{key}`: {detail}")]
    Serialization { key: String, detail: String },
}

impl From<CacheError> for FleetError {
    fn from(value: CacheError) -> Self {
        match value {
            CacheError::Backend { key, detail } => FleetError::transient("cache.backend_failure", format!("{key}: {detail}")),
            CacheError::Serialization { key, detail } => {
                FleetError::validation("cache.serialization_failure", format!("{key}: {detail}"))
            }
        }
    }
}
