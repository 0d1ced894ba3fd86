//! Inbound deadline middleware (spec §4.3 "Deadline propagation": "inbound
//! handlers may set it from an `X-Request-Deadline` header ... outbound HTTP
//! interceptors read and re-emit the same header").

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use fleetctl_core::context::{self, Deadline};

pub async fn propagate_deadline(request: Request, next: Next) -> Response {
    let deadline = request
        .headers()
        .get(context::DEADLINE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(Deadline::from_header_value);

    context::with_deadline(deadline, next.run(request)).await
}
