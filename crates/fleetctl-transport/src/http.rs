//! HTTP transport. Thrift/gRPC are out of codec scope per spec §1 ("no
//! reimplementation" of protocol stacks this workspace doesn't own); their
//! `EndpointAddress::HostPort` formatting exists so the producer can log and
//! route correctly even though only the HTTP binding actually sends bytes.

use crate::error::TransportError;
use crate::protocol::EndpointAddress;
use crate::Transport;
use async_trait::async_trait;
use fleetctl_core::context;
use fleetctl_core::error::{FleetError, Result};
use reqwest::Client;
use serde_json::Value;

pub struct HttpTransport {
    client: Client,
    path: String,
}

impl HttpTransport {
    pub fn new(client: Client, path: impl Into<String>) -> Self {
        Self { client, path: path.into() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, address: &EndpointAddress, payload: &Value) -> Result<()> {
        let EndpointAddress::Url(base) = address else {
            return Err(FleetError::validation(
                "transport.unsupported_address",
                "http transport requires a URL endpoint address",
            ));
        };
        let url = format!("{}{}", base.trim_end_matches('/'), self.path);

        let mut request = self.client.post(&url).json(payload);
        if let Some(deadline) = context::current() {
            if let Some(value) = context::format_header_value(deadline) {
                request = request.header(context::DEADLINE_HEADER, value);
            }
        }

        let response = request.send().await.map_err(|err| TransportError::Http { url: url.clone(), detail: err.to_string() })?;
        if !response.status().is_success() {
            return Err(TransportError::Http { url, detail: format!("status {}", response.status()) }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_core::context::{with_deadline, Deadline};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Scenario 6 (inbound deadline propagation): a call made from inside a
    /// `with_deadline` scope must carry `X-Request-Deadline` on the outbound
    /// request, verified against the raw bytes a bare TCP listener receives
    /// rather than a mocked client.
    #[tokio::test]
    async fn outbound_call_carries_the_ambient_deadline_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_lowercase()
        });

        let transport = HttpTransport::new(Client::new(), "/ingest");
        let endpoint = EndpointAddress::Url(format!("http://{addr}"));
        let deadline = Deadline::after(Duration::from_secs(30));

        with_deadline(Some(deadline), async {
            transport.send(&endpoint, &serde_json::json!({"ok": true})).await.unwrap();
        })
        .await;

        let received = accept.await.unwrap();
        assert!(received.contains("x-request-deadline:"));
    }
}
