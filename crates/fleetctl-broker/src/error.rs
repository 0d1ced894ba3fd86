use fleetctl_core::error::FleetError;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to publish to topic `{topic}`: {detail}")]
    Publish { topic: String, detail: String },

    #[error("failed to consume from topic `{topic}`: {detail}")]
    Consume { topic: String, detail: String },

    #[error("failed to commit offset on topic `{topic}` partition {partition}: {detail}")]
    Commit { topic: String, partition: i32, detail: String },
}

impl From<BrokerError> for FleetError {
    fn from(value: BrokerError) -> Self {
        match value {
            BrokerError::Publish { topic, detail } => FleetError::transient("broker.publish_failed", format!("{topic}: {detail}")),
            BrokerError::Consume { topic, detail } => FleetError::transient("broker.consume_failed", format!("{topic}: {detail}")),
            BrokerError::Commit { topic, partition, detail } => {
                FleetError::transient("broker.commit_failed", format!("{topic}[{partition}]: {detail}"))
            }
        }
    }
}
