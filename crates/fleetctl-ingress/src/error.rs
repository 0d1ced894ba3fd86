//! Maps the shared `FleetError` taxonomy onto HTTP responses (spec §7
//! "REST layer maps taxonomy to HTTP. Structured error bodies carry
//! `detail` and a stable `code`.").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fleetctl_core::error::FleetError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    detail: String,
}

pub struct ApiError(pub FleetError);

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { code: self.0.code(), detail: self.0.detail().to_owned() };

        let mut response = (status, Json(body)).into_response();
        if matches!(status, StatusCode::SERVICE_UNAVAILABLE) {
            response.headers_mut().insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}
