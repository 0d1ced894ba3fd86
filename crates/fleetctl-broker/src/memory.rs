//! In-memory `Broker`: a per-(topic, partition) `VecDeque` behind a
//! `tokio::sync::Mutex`, used by the contract test suite to assert
//! per-service ordering (spec §8) and DLQ thresholds deterministically
//! without a running Kafka cluster.

use crate::{Broker, BrokerRecord};
use async_trait::async_trait;
use fleetctl_core::error::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::Mutex;
use std::time::Duration;

/// Hashes `key` into one of `partition_count` partitions; same key always
/// maps to the same partition, which is what gives the broker its
/// per-`serviceName` ordering guarantee.
fn partition_for(key: &str, partition_count: i32) -> i32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % partition_count.max(1) as u64) as i32
}

#[derive(Default)]
struct TopicLog {
    partitions: HashMap<i32, VecDeque<(i64, String, Vec<u8>)>>,
    committed: HashMap<i32, i64>,
    next_offset: HashMap<i32, i64>,
}

pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, TopicLog>>,
    partition_count: i32,
    publish_calls: AtomicI32,
}

impl InMemoryBroker {
    pub fn new(partition_count: i32) -> Self {
        Self { topics: Mutex::new(HashMap::new()), partition_count: partition_count.max(1), publish_calls: AtomicI32::new(0) }
    }

    /// Total number of successful `publish` calls, used by tests asserting
    /// the DLQ threshold (spec §8 "DLQ threshold": "at most once").
    pub fn publish_count(&self) -> i32 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every record ever published to `topic`, in partition
    /// order then offset order, used by tests asserting per-service
    /// ordering.
    pub async fn all_records(&self, topic: &str) -> Vec<BrokerRecord> {
        let topics = self.topics.lock().await;
        let Some(log) = topics.get(topic) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut partitions: Vec<_> = log.partitions.keys().copied().collect();
        partitions.sort();
        for partition in partitions {
            for (offset, key, payload) in &log.partitions[&partition] {
                out.push(BrokerRecord { topic: topic.to_string(), partition, offset: *offset, key: key.clone(), payload: payload.clone() });
            }
        }
        out
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut topics = self.topics.lock().await;
        let log = topics.entry(topic.to_string()).or_default();
        let partition = partition_for(key, self.partition_count);
        let offset = *log.next_offset.entry(partition).or_insert(0);
        log.next_offset.insert(partition, offset + 1);
        log.partitions.entry(partition).or_default().push_back((offset, key.to_string(), payload));
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn consume_batch(
        &self,
        topic: &str,
        max_records: usize,
        _fetch_min_bytes: usize,
        _fetch_max_wait: Duration,
    ) -> Result<Vec<BrokerRecord>> {
        let mut topics = self.topics.lock().await;
        let Some(log) = topics.get_mut(topic) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        let mut partitions: Vec<_> = log.partitions.keys().copied().collect();
        partitions.sort();
        'outer: for partition in partitions {
            let committed = *log.committed.get(&partition).unwrap_or(&-1);
            for (offset, key, payload) in &log.partitions[&partition] {
                if *offset <= committed {
                    continue;
                }
                out.push(BrokerRecord { topic: topic.to_string(), partition, offset: *offset, key: key.clone(), payload: payload.clone() });
                if out.len() >= max_records {
                    break 'outer;
                }
            }
        }
        Ok(out)
    }

    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<()> {
        let mut topics = self.topics.lock().await;
        let log = topics.entry(topic.to_string()).or_default();
        log.committed.insert(partition, offset);
        Ok(())
    }
}
