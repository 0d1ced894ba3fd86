//! `BatchConsumer`: pulls batches, upserts the projection, retries with
//! exponential backoff, and routes poison batches to the DLQ (spec §4.1
//! "Consumer contract").

use crate::retry_counter::{backoff_for, RetryCounter};
use crate::state::BatchStateMachine;
use fleetctl_broker::{Broker, BrokerRecord, DlqRouter};
use fleetctl_core::config::ConsumerConfig;
use fleetctl_core::context;
use fleetctl_core::error::Result;
use fleetctl_core::model::BatchState;
use fleetctl_core::observability::Metrics;
use fleetctl_core::HeartbeatPayload;
use fleetctl_projection::ProjectionStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct BatchConsumer {
    topic: String,
    config: ConsumerConfig,
    projection: Arc<dyn ProjectionStore>,
    metrics: Arc<dyn Metrics>,
    shutdown_tx: watch::Sender<bool>,
}

impl BatchConsumer {
    pub fn new(topic: impl Into<String>, config: ConsumerConfig, projection: Arc<dyn ProjectionStore>, metrics: Arc<dyn Metrics>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { topic: topic.into(), config, projection, metrics, shutdown_tx }
    }

    /// Spawns `config.concurrency` worker tasks, one per element of
    /// `brokers` (spec §5: "each owns one or more partitions"). In
    /// production each element is a distinct `KafkaBroker` consumer sharing
    /// one `group.id`, so Kafka itself assigns disjoint partitions; the
    /// in-memory test double shares one `Arc<InMemoryBroker>` across every
    /// worker, since there is no external rebalance to honor.
    pub fn run(self: Arc<Self>, brokers: Vec<Arc<dyn Broker>>) -> Vec<JoinHandle<()>> {
        brokers
            .into_iter()
            .enumerate()
            .map(|(worker_index, broker)| {
                let this = self.clone();
                let shutdown_rx = this.shutdown_tx.subscribe();
                tokio::spawn(async move { this.run_worker(worker_index, broker, shutdown_rx).await })
            })
            .collect()
    }

    /// Requests every worker to stop. Uses a `watch` channel rather than
    /// `Notify` so the signal is never lost: `watch` retains the last value
    /// sent, so a worker that is busy inside `process_batch` (not parked on
    /// a wait) still observes the shutdown the next time it checks or
    /// awaits the receiver, instead of missing a one-shot wake-up.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn run_worker(&self, worker_index: usize, broker: Arc<dyn Broker>, mut shutdown_rx: watch::Receiver<bool>) {
        let retry_counter = RetryCounter::new();
        loop {
            if *shutdown_rx.borrow() {
                tracing::info!(worker_index, "consumer.worker.shutdown");
                return;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    tracing::info!(worker_index, "consumer.worker.shutdown");
                    return;
                }
                batch = broker.consume_batch(&self.topic, self.config.max_poll_records, self.config.fetch_min_bytes, self.config.fetch_max_wait) => {
                    match batch {
                        Ok(records) if !records.is_empty() => {
                            self.process_batch(worker_index, broker.as_ref(), records, &retry_counter, &mut shutdown_rx).await;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(worker_index, error = %err, "consumer.poll_failed");
                        }
                    }
                }
            }
        }
    }

    async fn process_batch(&self, worker_index: usize, broker: &dyn Broker, records: Vec<BrokerRecord>, retry_counter: &RetryCounter, shutdown_rx: &mut watch::Receiver<bool>) {
        let mut fsm = BatchStateMachine::new();
        let started = Instant::now();

        loop {
            fsm.transition(BatchState::Processing).expect("received -> processing is always legal");

            match self.ingest(&records).await {
                Ok(()) => {
                    self.commit_high_watermarks(broker, &records).await;
                    retry_counter.reset();
                    fsm.transition(BatchState::Committed).expect("processing -> committed is always legal");

                    self.metrics.record_histogram("heartbeat.batch.size", records.len() as f64, &[]);
                    self.metrics.record_histogram("heartbeat.batch.latency", started.elapsed().as_secs_f64() * 1000.0, &[]);
                    self.metrics.increment_counter("heartbeat.ingest.count", &[]);
                    return;
                }
                Err(err) => {
                    let attempt = retry_counter.increment();
                    tracing::warn!(worker_index, attempt, error = %err, "consumer.batch_processing_failed");

                    if attempt > self.config.max_retries {
                        self.route_to_dlq(broker, &records).await;
                        self.commit_high_watermarks(broker, &records).await;
                        retry_counter.reset();
                        fsm.transition(BatchState::DlqRouted).expect("processing -> dlq_routed is always legal");
                        fsm.transition(BatchState::Committed).expect("dlq_routed -> committed is always legal");
                        return;
                    }

                    fsm.transition(BatchState::RetryScheduled).expect("processing -> retry_scheduled is always legal");
                    if !sleep_cancellable(backoff_for(attempt), shutdown_rx).await {
                        tracing::info!(worker_index, "consumer.batch_left_uncommitted_on_cancellation");
                        return;
                    }
                    fsm.transition(BatchState::Processing).expect("retry_scheduled -> processing is always legal");
                }
            }
        }
    }

    /// Deserializes every record and upserts its projection. A single
    /// malformed record fails the whole batch (spec §4.1: "on processing
    /// exception ... re-throws so the broker re-delivers the same batch").
    async fn ingest(&self, records: &[BrokerRecord]) -> Result<()> {
        let now = chrono::Utc::now();
        for record in records {
            let payload: HeartbeatPayload = serde_json::from_slice(&record.payload).map_err(|err| {
                fleetctl_core::error::FleetError::Poison { code: "consumer.deserialize_failed", detail: err.to_string() }
            })?;
            self.projection.upsert(payload, now).await?;
        }
        Ok(())
    }

    async fn commit_high_watermarks(&self, broker: &dyn Broker, records: &[BrokerRecord]) {
        let mut high_watermarks: HashMap<i32, i64> = HashMap::new();
        for record in records {
            let entry = high_watermarks.entry(record.partition).or_insert(record.offset);
            if record.offset > *entry {
                *entry = record.offset;
            }
        }
        for (partition, offset) in high_watermarks {
            if let Err(err) = broker.commit(&self.topic, partition, offset).await {
                tracing::error!(partition, offset, error = %err, "consumer.commit_failed");
            }
        }
    }

    async fn route_to_dlq(&self, broker: &dyn Broker, records: &[BrokerRecord]) {
        let router = DlqRouter::new(broker);
        for record in records {
            router.route(&self.topic, &record.key, record.payload.clone()).await;
        }
    }
}

/// Deadline- and shutdown-aware sleep matching the resilience fabric's
/// cancellable waits (spec §5): returns `false` if the ambient deadline
/// elapses first, or if `shutdown` fires while waiting. Checks `shutdown`
/// before sleeping too, since `watch::Receiver::changed` only resolves on a
/// *transition*: if the value was already `true` when the wait started, the
/// wait must not block until some later `send` — there won't be one.
async fn sleep_cancellable(duration: std::time::Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    let (wait_for, completes_normally) = match context::current().and_then(|d| d.remaining()) {
        Some(remaining) if remaining < duration => (remaining, false),
        _ => (duration, true),
    };
    tokio::select! {
        _ = tokio::time::sleep(wait_for) => completes_normally,
        _ = shutdown.changed() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_broker::InMemoryBroker;
    use fleetctl_projection::InMemoryProjectionStore;
    use std::collections::BTreeMap;

    fn config() -> ConsumerConfig {
        ConsumerConfig { concurrency: 1, max_poll_records: 100, fetch_min_bytes: 0, fetch_max_wait: std::time::Duration::from_millis(20), max_retries: 3, dlq_topic: "heartbeats.dlq".into() }
    }

    fn payload_bytes(service_name: &str, instance_id: &str) -> Vec<u8> {
        let payload = HeartbeatPayload::new(service_name, instance_id, "hash", "h1", 8080, "prod", "1.0.0", BTreeMap::new(), chrono::Utc::now()).unwrap();
        serde_json::to_vec(&payload).unwrap()
    }

    #[tokio::test]
    async fn healthy_batch_commits_and_updates_the_projection() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new(1));
        broker.publish("heartbeats", "svc-a", payload_bytes("svc-a", "svc-a-1")).await.unwrap();

        let projection: Arc<dyn ProjectionStore> = Arc::new(InMemoryProjectionStore::new());
        let consumer = Arc::new(BatchConsumer::new("heartbeats", config(), projection.clone(), Arc::new(fleetctl_core::observability::TracingMetrics)));

        let handles = consumer.clone().run(vec![broker]);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        consumer.shutdown();
        for handle in handles {
            let _ = handle.await;
        }

        assert!(projection.get("svc-a-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn poison_record_is_routed_to_dlq_after_max_retries() {
        let in_memory = Arc::new(InMemoryBroker::new(1));
        in_memory.publish("heartbeats", "svc-a", b"not valid json".to_vec()).await.unwrap();
        let broker: Arc<dyn Broker> = in_memory.clone();

        let projection: Arc<dyn ProjectionStore> = Arc::new(InMemoryProjectionStore::new());
        let cfg = ConsumerConfig { max_retries: 2, fetch_max_wait: std::time::Duration::from_millis(5), ..config() };
        let consumer = Arc::new(BatchConsumer::new("heartbeats", cfg, projection.clone(), Arc::new(fleetctl_core::observability::TracingMetrics)));

        let handles = consumer.clone().run(vec![broker]);
        // Two failed attempts back off 2^0 + 2^1 = 3s before the third
        // attempt routes to the DLQ; give the worker room to finish that
        // before asking it to shut down.
        tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
        consumer.shutdown();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(in_memory.publish_count(), 2, "one original publish + one dlq republish");
        assert!(projection.get("svc-a-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shutdown_during_retry_backoff_unblocks_the_worker_promptly() {
        let in_memory = Arc::new(InMemoryBroker::new(1));
        in_memory.publish("heartbeats", "svc-a", b"not valid json".to_vec()).await.unwrap();
        let broker: Arc<dyn Broker> = in_memory.clone();

        let projection: Arc<dyn ProjectionStore> = Arc::new(InMemoryProjectionStore::new());
        let cfg = ConsumerConfig { max_retries: 5, fetch_max_wait: std::time::Duration::from_millis(5), ..config() };
        let consumer = Arc::new(BatchConsumer::new("heartbeats", cfg, projection, Arc::new(fleetctl_core::observability::TracingMetrics)));

        let handles = consumer.clone().run(vec![broker]);
        // Fires mid-way through the first (1s) retry backoff, while the
        // worker is busy inside `process_batch`, not parked on the
        // shutdown signal.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        consumer.shutdown();

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        for handle in handles {
            assert!(tokio::time::timeout_at(deadline, handle).await.is_ok(), "worker did not stop promptly after shutdown");
        }
    }
}
