//! Approval REST surface (spec §6 "Approval REST surface (minimum required
//! by the core)").

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use fleetctl_approval::{ApprovalRequest, ApprovalTarget, Decision, DecisionSnapshot, RequestType};
use fleetctl_core::error::FleetError;
use fleetctl_core::ids::{GateName, RequestId, ServiceId, TeamId, UserId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApprovalRequestBody {
    pub requester_user_id: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub snapshot: DecisionSnapshot,
}

pub async fn create_approval_request(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Json(body): Json<CreateApprovalRequestBody>,
) -> Result<(StatusCode, Json<ApprovalRequest>), ApiError> {
    let target = ApprovalTarget { service_id: Some(ServiceId::from(service_id)), team_id: body.team_id.map(TeamId::from) };
    let request = state.approvals.create(UserId::from(body.requester_user_id), body.request_type, target, body.snapshot).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_approval_request(State(state): State<AppState>, Path(request_id): Path<String>) -> Result<Json<ApprovalRequest>, ApiError> {
    let request = state
        .approvals
        .get(&RequestId::from(request_id.clone()))
        .await?
        .ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id))?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDecisionBody {
    pub approver_user_id: String,
    pub gate: String,
    pub decision: Decision,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn record_decision(State(state): State<AppState>, Path(request_id): Path<String>, Json(body): Json<RecordDecisionBody>) -> Result<Json<ApprovalRequest>, ApiError> {
    let updated = state
        .approvals
        .record_decision(&RequestId::from(request_id), UserId::from(body.approver_user_id), GateName::from(body.gate), body.decision, body.note)
        .await?;
    Ok(Json(updated))
}
