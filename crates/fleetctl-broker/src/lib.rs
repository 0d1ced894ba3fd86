//! Partitioned, ordered, durable message-bus abstraction (spec §4.1
//! "Broker contract"). No direct teacher counterpart — `spark-core` never
//! models a message bus — so this crate is built in the pack's idiom
//! (`async_trait` interfaces, `thiserror` error domain) and backed by
//! `rdkafka` for production, with an in-memory implementation the test
//! suite uses to assert per-service ordering and DLQ thresholds
//! deterministically.

pub mod error;
pub mod kafka;
pub mod memory;

pub use error::BrokerError;
pub use kafka::KafkaBroker;
pub use memory::InMemoryBroker;

use async_trait::async_trait;
use fleetctl_core::error::Result;
use std::time::Duration;

/// One message pulled from a topic; `key` is the partition key
/// (`serviceName` for the heartbeat topic).
#[derive(Debug, Clone)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub payload: Vec<u8>,
}

/// A partitioned, durable, ordered queue (spec §4.1 "Broker contract"):
/// same-key records are delivered in submission order to a single consumer;
/// delivery is at-least-once; offsets commit only on explicit
/// acknowledgement.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()>;

    async fn consume_batch(
        &self,
        topic: &str,
        max_records: usize,
        fetch_min_bytes: usize,
        fetch_max_wait: Duration,
    ) -> Result<Vec<BrokerRecord>>;

    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<()>;
}

/// Republishes one record onto `{topic}-dlq`, preserving its partition key.
/// A publish failure here is logged and never fatal (spec §4.1).
pub struct DlqRouter<'a> {
    broker: &'a dyn Broker,
}

impl<'a> DlqRouter<'a> {
    pub fn new(broker: &'a dyn Broker) -> Self {
        Self { broker }
    }

    pub async fn route(&self, topic: &str, key: &str, payload: Vec<u8>) {
        let dlq_topic = format!("{topic}-dlq");
        if let Err(err) = self.broker.publish(&dlq_topic, key, payload).await {
            tracing::error!(topic = %dlq_topic, key, error = %err, "failed to publish poison record to dlq");
        }
    }
}
