//! Wire-protocol selection and endpoint formatting (spec §4.1 item (c)): the
//! heartbeat producer resolves a `ServiceInstance` via discovery, then a
//! `TransportProtocol` turns it into the address shape that protocol needs.

use fleetctl_discovery::ServiceInstance;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    Http,
    Thrift,
    Grpc,
}

impl TransportProtocol {
    /// Metadata key this protocol reads its port override from, falling
    /// back to `default_port` when absent or unparseable.
    fn port_metadata_key(self) -> Option<&'static str> {
        match self {
            TransportProtocol::Http => None,
            TransportProtocol::Thrift => Some("thrift-port"),
            TransportProtocol::Grpc => Some("grpc-port"),
        }
    }

    fn default_port(self) -> u16 {
        match self {
            TransportProtocol::Http => 80,
            TransportProtocol::Thrift => 9090,
            TransportProtocol::Grpc => 9091,
        }
    }

    /// Formats an instance into the address shape this protocol expects:
    /// an HTTP base URL, or a `host:port` pair for the binary protocols,
    /// with the port read from instance metadata per spec §4.1 item (c).
    pub fn format_address(self, instance: &ServiceInstance) -> EndpointAddress {
        match self {
            TransportProtocol::Http => EndpointAddress::Url(format!("http://{}:{}", instance.host, instance.port)),
            TransportProtocol::Thrift | TransportProtocol::Grpc => {
                let port = self
                    .port_metadata_key()
                    .and_then(|key| instance.metadata.get(key))
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or_else(|| self.default_port());
                EndpointAddress::HostPort(instance.host.clone(), port)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddress {
    Url(String),
    HostPort(String, u16),
}

impl EndpointAddress {
    pub fn direct_url(url: impl Into<String>) -> Self {
        EndpointAddress::Url(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_formats_a_base_url() {
        let instance = ServiceInstance::new("svc-a", "svc-a-1", "h1", 8080);
        let address = TransportProtocol::Http.format_address(&instance);
        assert_eq!(address, EndpointAddress::Url("http://h1:8080".into()));
    }

    #[test]
    fn grpc_reads_port_from_metadata() {
        let instance = ServiceInstance::new("svc-a", "svc-a-1", "h1", 8080).with_metadata("grpc-port", "9500");
        let address = TransportProtocol::Grpc.format_address(&instance);
        assert_eq!(address, EndpointAddress::HostPort("h1".into(), 9500));
    }

    #[test]
    fn thrift_falls_back_to_default_port_on_missing_metadata() {
        let instance = ServiceInstance::new("svc-a", "svc-a-1", "h1", 8080);
        let address = TransportProtocol::Thrift.format_address(&instance);
        assert_eq!(address, EndpointAddress::HostPort("h1".into(), 9090));
    }

    #[test]
    fn invalid_port_metadata_falls_back_to_default() {
        let instance = ServiceInstance::new("svc-a", "svc-a-1", "h1", 8080).with_metadata("grpc-port", "not-a-port");
        let address = TransportProtocol::Grpc.format_address(&instance);
        assert_eq!(address, EndpointAddress::HostPort("h1".into(), 9091));
    }
}
