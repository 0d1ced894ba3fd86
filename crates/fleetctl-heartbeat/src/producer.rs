//! `HeartbeatProducer::send()` (spec §4.1 "Producer contract"): builds the
//! payload, resolves an endpoint, sends it over the transport, and never
//! lets a transport failure stop the scheduling loop.

use crate::descriptor::HeartbeatDescriptor;
use fleetctl_core::observability::{LatencyHistogram, Metrics};
use fleetctl_core::{compute_config_hash, HeartbeatPayload};
use fleetctl_discovery::{DiscoveryClient, SelectionKey};
use fleetctl_transport::{EndpointAddress, Transport, TransportProtocol};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn protocol_label(protocol: TransportProtocol) -> &'static str {
    match protocol {
        TransportProtocol::Http => "http",
        TransportProtocol::Thrift => "thrift",
        TransportProtocol::Grpc => "grpc",
    }
}

/// The SDK-side heartbeat producer. One instance per process; `send()` is
/// called on every tick of the scheduler (spec §4.1).
pub struct HeartbeatProducer {
    descriptor: HeartbeatDescriptor,
    discovery: Arc<DiscoveryClient>,
    target_service: String,
    direct_fallback_url: Option<String>,
    protocol: TransportProtocol,
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn Metrics>,
    latency: Arc<LatencyHistogram>,
    enabled: AtomicBool,
}

impl HeartbeatProducer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        descriptor: HeartbeatDescriptor,
        discovery: Arc<DiscoveryClient>,
        target_service: impl Into<String>,
        direct_fallback_url: Option<String>,
        protocol: TransportProtocol,
        transport: Arc<dyn Transport>,
        metrics: Arc<dyn Metrics>,
        latency: Arc<LatencyHistogram>,
    ) -> Self {
        Self {
            descriptor,
            discovery,
            target_service: target_service.into(),
            direct_fallback_url,
            protocol,
            transport,
            metrics,
            latency,
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Builds and sends one heartbeat. Never returns an error: transport
    /// failures are logged and swallowed so the scheduler loop always
    /// continues (spec §4.1 item (e)).
    pub async fn send(&self) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        let protocol = protocol_label(self.protocol);
        self.metrics.increment_counter("ping.attempt", &[("protocol", protocol)]);

        let config_hash = compute_config_hash(&self.descriptor.properties);
        let payload = match HeartbeatPayload::new(
            self.descriptor.service_name.as_str(),
            self.descriptor.instance_id.as_str(),
            config_hash,
            self.descriptor.host.clone(),
            self.descriptor.port,
            self.descriptor.environment.clone(),
            self.descriptor.version.clone(),
            self.descriptor.properties.clone(),
            chrono::Utc::now(),
        ) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "heartbeat.payload.invalid");
                self.metrics.increment_counter("ping.failure", &[("protocol", protocol)]);
                return;
            }
        };

        let address = self.resolve_endpoint().await;
        let Some(address) = address else {
            self.metrics.increment_counter("ping.failure", &[("protocol", protocol)]);
            return;
        };

        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "heartbeat.payload.serialize_failed");
                self.metrics.increment_counter("ping.failure", &[("protocol", protocol)]);
                return;
            }
        };

        let started = Instant::now();
        match self.transport.send(&address, &body).await {
            Ok(()) => {
                self.latency.observe(started.elapsed());
                self.metrics.increment_counter("ping.success", &[("protocol", protocol)]);
                let (p50, p90, p95, p99) = self.latency.percentiles();
                self.metrics.record_histogram("ping.latency.p50", p50.as_secs_f64() * 1000.0, &[("protocol", protocol)]);
                self.metrics.record_histogram("ping.latency.p90", p90.as_secs_f64() * 1000.0, &[("protocol", protocol)]);
                self.metrics.record_histogram("ping.latency.p95", p95.as_secs_f64() * 1000.0, &[("protocol", protocol)]);
                self.metrics.record_histogram("ping.latency.p99", p99.as_secs_f64() * 1000.0, &[("protocol", protocol)]);
            }
            Err(err) => {
                tracing::warn!(error = %err, service = %self.descriptor.service_name, "heartbeat.send_failed");
                self.metrics.increment_counter("ping.failure", &[("protocol", protocol)]);
            }
        }
    }

    /// Resolves the endpoint to send to: discovery lookup first, a direct
    /// URL fallback if discovery returns no instances or errors (spec §4.1
    /// item (b)).
    async fn resolve_endpoint(&self) -> Option<EndpointAddress> {
        let key = SelectionKey::new(self.descriptor.instance_id.as_str());
        match self.discovery.resolve(&self.target_service, &key, None).await {
            Ok(instance) => Some(self.protocol.format_address(&instance)),
            Err(err) => {
                tracing::debug!(error = %err, service = %self.target_service, "heartbeat.discovery_miss");
                self.direct_fallback_url.clone().map(EndpointAddress::direct_url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleetctl_core::observability::TracingMetrics;
    use fleetctl_discovery::backend::StaticDiscoveryBackend;
    use fleetctl_discovery::registry::ServiceInstance;
    use fleetctl_discovery::policy::LoadBalancerPolicyKind;
    use fleetctl_core::error::Result;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct RecordingTransport {
        calls: AtomicUsize,
        last_address: Mutex<Option<EndpointAddress>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, address: &EndpointAddress, _payload: &Value) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_address.lock().unwrap() = Some(address.clone());
            Ok(())
        }
    }

    fn descriptor() -> HeartbeatDescriptor {
        HeartbeatDescriptor {
            service_name: "svc-a".into(),
            instance_id: "svc-a-1".into(),
            host: "h1".into(),
            port: 8080,
            environment: "prod".into(),
            version: "1.0.0".into(),
            properties: Default::default(),
        }
    }

    #[tokio::test]
    async fn sends_through_the_resolved_discovery_endpoint() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        backend.register("control-plane", ServiceInstance::new("control-plane", "ingress-1", "ingress-host", 9000));
        let discovery = Arc::new(DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin));
        let transport = Arc::new(RecordingTransport { calls: AtomicUsize::new(0), last_address: Mutex::new(None) });

        let producer = HeartbeatProducer::new(
            descriptor(),
            discovery,
            "control-plane",
            None,
            TransportProtocol::Http,
            transport.clone(),
            Arc::new(TracingMetrics),
            Arc::new(LatencyHistogram::new(16)),
        );

        producer.send().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*transport.last_address.lock().unwrap(), Some(EndpointAddress::Url("http://ingress-host:9000".into())));
    }

    #[tokio::test]
    async fn falls_back_to_direct_url_when_discovery_has_no_instances() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        let discovery = Arc::new(DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin));
        let transport = Arc::new(RecordingTransport { calls: AtomicUsize::new(0), last_address: Mutex::new(None) });

        let producer = HeartbeatProducer::new(
            descriptor(),
            discovery,
            "control-plane",
            Some("http://fallback-host:9000".into()),
            TransportProtocol::Http,
            transport.clone(),
            Arc::new(TracingMetrics),
            Arc::new(LatencyHistogram::new(16)),
        );

        producer.send().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*transport.last_address.lock().unwrap(), Some(EndpointAddress::Url("http://fallback-host:9000".into())));
    }

    #[tokio::test]
    async fn disabled_producer_never_calls_the_transport() {
        let backend = Arc::new(StaticDiscoveryBackend::new());
        let discovery = Arc::new(DiscoveryClient::new(backend, LoadBalancerPolicyKind::RoundRobin));
        let transport = Arc::new(RecordingTransport { calls: AtomicUsize::new(0), last_address: Mutex::new(None) });

        let producer = HeartbeatProducer::new(
            descriptor(),
            discovery,
            "control-plane",
            None,
            TransportProtocol::Http,
            transport.clone(),
            Arc::new(TracingMetrics),
            Arc::new(LatencyHistogram::new(16)),
        );
        producer.set_enabled(false);

        producer.send().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
