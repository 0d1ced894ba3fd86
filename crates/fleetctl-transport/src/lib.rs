//! Protocol-aware outbound transport (spec §4.1 item (c)/(d), §4.3), grounded
//! on the teacher's `spark-transport-tcp`: one crate, one concrete transport
//! binding behind a shared trait, with the wire protocol variants the
//! heartbeat producer needs (`Http`, `Thrift`, `Grpc`) formatted here rather
//! than scattered across call sites.

pub mod error;
pub mod http;
pub mod protocol;
pub mod resilient;

pub use error::TransportError;
pub use protocol::{EndpointAddress, TransportProtocol};
pub use resilient::{GovernanceHandles, ResilientTransport};

use async_trait::async_trait;
use fleetctl_core::error::Result;
use serde_json::Value;

/// A single outbound send. Implementations format `address` per their own
/// protocol; the resilience fabric wraps every call made through this trait
/// before it reaches the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, address: &EndpointAddress, payload: &Value) -> Result<()>;
}
