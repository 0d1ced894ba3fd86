//! Composition surface the router closes over (spec §2: "Control-plane
//! HTTP ingress (thin) ... a thin shell over the core" — this crate owns no
//! business logic, only request/response translation).

use fleetctl_approval::ApprovalAggregate;
use fleetctl_broker::Broker;
use fleetctl_cache::CacheEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub approvals: Arc<ApprovalAggregate>,
    pub broker: Arc<dyn Broker>,
    pub heartbeat_topic: Arc<str>,
    pub cache: Arc<CacheEngine>,
}
