//! Ticks a `HeartbeatProducer` on a fixed interval. Grounded on the
//! teacher's tick-driven task-bundle loop (`run_heartbeat_loop`), generalized
//! to a cancellable `tokio::time::interval` task.

use crate::producer::HeartbeatProducer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct HeartbeatScheduler {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    /// Spawns the scheduling loop; `producer.send()` runs once per `interval`
    /// tick and never aborts the loop on its own (spec §4.1).
    pub fn spawn(producer: Arc<HeartbeatProducer>, interval: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let shutdown_signal = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => producer.send().await,
                    _ = shutdown_signal.notified() => break,
                }
            }
        });

        Self { shutdown, handle: Some(handle) }
    }

    /// Signals the scheduling loop to stop after its current tick and waits
    /// for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HeartbeatDescriptor;
    use async_trait::async_trait;
    use fleetctl_core::error::Result;
    use fleetctl_core::observability::{LatencyHistogram, TracingMetrics};
    use fleetctl_discovery::backend::StaticDiscoveryBackend;
    use fleetctl_discovery::policy::LoadBalancerPolicyKind;
    use fleetctl_discovery::DiscoveryClient;
    use fleetctl_transport::{EndpointAddress, Transport, TransportProtocol};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport(AtomicUsize);

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _address: &EndpointAddress, _payload: &Value) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_every_tick_until_shutdown() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        let discovery = Arc::new(DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin));
        let transport = Arc::new(CountingTransport(AtomicUsize::new(0)));

        let producer = Arc::new(HeartbeatProducer::new(
            HeartbeatDescriptor {
                service_name: "svc-a".into(),
                instance_id: "svc-a-1".into(),
                host: "h1".into(),
                port: 8080,
                environment: "prod".into(),
                version: "1.0.0".into(),
                properties: Default::default(),
            },
            discovery,
            "control-plane",
            Some("http://fallback:9000".into()),
            TransportProtocol::Http,
            transport.clone(),
            Arc::new(TracingMetrics),
            Arc::new(LatencyHistogram::new(16)),
        ));

        let scheduler = HeartbeatScheduler::spawn(producer, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(35)).await;
        tokio::task::yield_now().await;
        scheduler.shutdown().await;

        assert!(transport.0.load(Ordering::SeqCst) >= 3);
    }
}
