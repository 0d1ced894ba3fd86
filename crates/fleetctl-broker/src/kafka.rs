//! Production `Broker` backed by `rdkafka`, with `enable.auto.commit`
//! disabled so every batch is committed explicitly by the consumer (spec
//! §4.1 guarantee iii).

use crate::error::BrokerError;
use crate::{Broker, BrokerRecord};
use async_trait::async_trait;
use fleetctl_core::error::Result;
use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Message, TopicPartitionList};
use std::time::Duration;

pub struct KafkaBroker {
    producer: FutureProducer,
    consumer: StreamConsumer,
}

impl KafkaBroker {
    pub fn connect(bootstrap_servers: &str, group_id: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|err| BrokerError::Publish { topic: "<producer-init>".into(), detail: err.to_string() })?;

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|err| BrokerError::Consume { topic: "<consumer-init>".into(), detail: err.to_string() })?;

        Ok(Self { producer, consumer })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<()> {
        self.consumer
            .subscribe(topics)
            .map_err(|err| BrokerError::Consume { topic: topics.join(","), detail: err.to_string() }.into())
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(err, _)| BrokerError::Publish { topic: topic.to_string(), detail: err.to_string() })?;
        Ok(())
    }

    async fn consume_batch(
        &self,
        topic: &str,
        max_records: usize,
        _fetch_min_bytes: usize,
        fetch_max_wait: Duration,
    ) -> Result<Vec<BrokerRecord>> {
        let mut records = Vec::with_capacity(max_records);
        let mut stream = self.consumer.stream();
        let deadline = tokio::time::sleep(fetch_max_wait);
        tokio::pin!(deadline);

        while records.len() < max_records {
            tokio::select! {
                biased;
                _ = &mut deadline => break,
                next = stream.next() => {
                    match next {
                        Some(Ok(message)) => {
                            let key = message.key().map(|k| String::from_utf8_lossy(k).into_owned()).unwrap_or_default();
                            let payload = message.payload().map(|p| p.to_vec()).unwrap_or_default();
                            records.push(BrokerRecord {
                                topic: topic.to_string(),
                                partition: message.partition(),
                                offset: message.offset(),
                                key,
                                payload,
                            });
                        }
                        Some(Err(err)) => {
                            return Err(BrokerError::Consume { topic: topic.to_string(), detail: err.to_string() }.into());
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(records)
    }

    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<()> {
        let mut partitions = TopicPartitionList::new();
        partitions
            .add_partition_offset(topic, partition, rdkafka::Offset::Offset(offset + 1))
            .map_err(|err| BrokerError::Commit { topic: topic.to_string(), partition, detail: err.to_string() })?;
        self.consumer
            .commit(&partitions, CommitMode::Sync)
            .map_err(|err| BrokerError::Commit { topic: topic.to_string(), partition, detail: err.to_string() }.into())
    }
}
