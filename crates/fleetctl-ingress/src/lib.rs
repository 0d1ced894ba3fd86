//! Control-plane HTTP ingress (spec §2: "a thin shell over the core"): five
//! routes wiring the heartbeat intake, the approval aggregate, and the
//! cache status endpoint, with the task-local deadline middleware installed
//! ahead of every handler.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/heartbeat", post(routes::heartbeat::ingest_heartbeat))
        .route("/api/approval-requests/application-services/:service_id/approval-requests", post(routes::approval::create_approval_request))
        .route("/api/approval-requests/:request_id", get(routes::approval::get_approval_request))
        .route("/api/approval-requests/:request_id/decisions", post(routes::approval::record_decision))
        .route("/status/cache", get(routes::status::cache_status))
        .layer(axum::middleware::from_fn(middleware::propagate_deadline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::state::AppState;
    use fleetctl_approval::{AllowAllAuthz, ApprovalAggregate, InMemoryApprovalStore, InMemoryDecisionStore};
    use fleetctl_broker::{Broker, InMemoryBroker};
    use fleetctl_cache::{CacheEngine, LocalCache};
    use std::sync::Arc;
    use std::time::Duration;

    pub fn test_state() -> (AppState, Arc<InMemoryBroker>) {
        let broker = Arc::new(InMemoryBroker::new(1));
        let broker_dyn: Arc<dyn Broker> = broker.clone();
        let approvals = Arc::new(ApprovalAggregate::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(InMemoryDecisionStore::new()),
            Arc::new(AllowAllAuthz),
            broker_dyn.clone(),
            chrono::Duration::hours(24),
        ));
        let cache = Arc::new(CacheEngine::new(Box::new(LocalCache::new(100, Duration::from_secs(60))), 1024, Duration::from_secs(60)));

        let state = AppState { approvals, broker: broker_dyn, heartbeat_topic: "heartbeats".into(), cache };
        (state, broker)
    }
}
