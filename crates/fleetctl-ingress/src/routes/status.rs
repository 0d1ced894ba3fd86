//! `GET /status/cache` (spec §4.4: "Provider hot-swap at runtime is
//! required and must be observable via a status endpoint").

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use fleetctl_cache::CacheStatus;

pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.cache.status())
}
