//! `POST /api/heartbeat` (spec §6 "Heartbeat wire format"): accepts the
//! camelCase wire payload, computes the config hash, and publishes onto the
//! broker keyed by `serviceName`. The handler never touches the projection
//! directly — that is the consumer's job on the other side of the broker.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use fleetctl_core::compute_config_hash;
use fleetctl_core::HeartbeatPayload;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatWireBody {
    pub service_name: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

pub async fn ingest_heartbeat(State(state): State<AppState>, Json(body): Json<HeartbeatWireBody>) -> Result<StatusCode, ApiError> {
    let config_hash = compute_config_hash(&body.metadata);
    let payload = HeartbeatPayload::new(
        body.service_name,
        body.instance_id,
        config_hash,
        body.host,
        body.port,
        body.environment,
        body.version,
        body.metadata,
        chrono::Utc::now(),
    )
    .map_err(ApiError::from)?;

    let partition_key = payload.partition_key().to_owned();
    let bytes = serde_json::to_vec(&payload).expect("HeartbeatPayload always serializes");
    state.broker.publish(&state.heartbeat_topic, &partition_key, bytes).await.map_err(ApiError::from)?;

    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn accepts_a_well_formed_heartbeat() {
        let (state, broker) = test_state();
        let app = crate::router(state);

        let body = serde_json::json!({
            "serviceName": "svc-a", "instanceId": "svc-a-1", "host": "h1", "port": 8080,
            "environment": "prod", "version": "1.0.0", "metadata": {"hostname": "h1"}
        });
        let request = Request::builder().method("POST").uri("/api/heartbeat").header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(broker.publish_count(), 1);
    }

    #[tokio::test]
    async fn rejects_an_empty_service_name() {
        let (state, _broker) = test_state();
        let app = crate::router(state);

        let body = serde_json::json!({
            "serviceName": "", "instanceId": "svc-a-1", "host": "h1", "port": 8080,
            "environment": "prod", "version": "1.0.0", "metadata": {}
        });
        let request = Request::builder().method("POST").uri("/api/heartbeat").header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
