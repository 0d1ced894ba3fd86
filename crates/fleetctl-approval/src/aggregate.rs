//! `ApprovalAggregate`: the four operations spec §4.2 names
//! (`create`/`recordDecision`/`cancel`/`expire`), composed from the pure
//! `gates`/`recompute` functions plus the `ApprovalStore`/`DecisionStore`/
//! `Authz`/`Broker` collaborators.

use crate::gates::required_gates;
use crate::recompute::recompute;
use crate::store::{ApprovalStore, DecisionStore, InsertOutcome};
use crate::types::{ApprovalDecision, ApprovalRequest, ApprovalTarget, Decision, DecisionSnapshot, RequestType};
use crate::Authz;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fleetctl_broker::Broker;
use fleetctl_core::error::{FleetError, Result};
use fleetctl_core::ids::{DecisionId, GateName, RequestId, UserId};
use fleetctl_core::model::RequestStatus;
use std::sync::Arc;
use std::time::Duration;

const MAX_CAS_ATTEMPTS: u32 = 3;
const CAS_BASE_BACKOFF: Duration = Duration::from_millis(20);

pub struct ApprovalAggregate {
    approvals: Arc<dyn ApprovalStore>,
    decisions: Arc<dyn DecisionStore>,
    authz: Arc<dyn Authz>,
    broker: Arc<dyn Broker>,
    finalized_topic: String,
    expiry_window: ChronoDuration,
}

impl ApprovalAggregate {
    pub fn new(approvals: Arc<dyn ApprovalStore>, decisions: Arc<dyn DecisionStore>, authz: Arc<dyn Authz>, broker: Arc<dyn Broker>, expiry_window: ChronoDuration) -> Self {
        Self { approvals, decisions, authz, broker, finalized_topic: "approval.request-finalized".to_owned(), expiry_window }
    }

    /// Read-only projection lookup (spec §6 `GET /api/approval-requests/{id}`).
    pub async fn get(&self, request_id: &RequestId) -> Result<Option<ApprovalRequest>> {
        self.approvals.get(request_id).await
    }

    /// Every request still `Pending`, consumed by the expiry sweep
    /// (`expiry::ExpirySweeper`).
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        self.approvals.list_pending().await
    }

    pub async fn create(&self, requester_user_id: UserId, request_type: RequestType, target: ApprovalTarget, snapshot: DecisionSnapshot) -> Result<ApprovalRequest> {
        let required = required_gates(request_type, &target, &snapshot);
        let now = Utc::now();
        let request = ApprovalRequest {
            id: RequestId::generate(),
            requester_user_id,
            request_type,
            target,
            required,
            status: RequestStatus::Pending,
            snapshot,
            counts: Default::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        self.approvals.insert(request.clone()).await?;
        Ok(request)
    }

    /// Records one approver's decision on one gate, then recomputes the
    /// aggregate's status. Duplicate `(request, approver, gate)` decisions
    /// are absorbed idempotently when they match the prior decision, and
    /// rejected as `Conflict` otherwise (spec §4.2).
    pub async fn record_decision(&self, request_id: &RequestId, approver_user_id: UserId, gate: GateName, decision: Decision, note: Option<String>) -> Result<ApprovalRequest> {
        let request = self.approvals.get(request_id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id.as_str()))?;

        if request.status != RequestStatus::Pending {
            return Err(FleetError::conflict("approval.request_not_pending", format!("request {request_id} is {:?}", request.status)));
        }
        if !request.required.iter().any(|g| g.gate == gate) {
            return Err(FleetError::validation("approval.gate_not_required", format!("gate {gate} is not required by request {request_id}")));
        }
        if !self.authz.is_authorized_for_gate(&approver_user_id, &gate, &request).await? {
            return Err(FleetError::Forbidden { code: "approval.not_authorized_for_gate", detail: format!("{approver_user_id} may not decide gate {gate}") });
        }

        let candidate = ApprovalDecision { id: DecisionId::generate(), request_id: request_id.clone(), approver_user_id, gate, decision, decided_at: Utc::now(), note };

        match self.decisions.insert(candidate.clone()).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::Duplicate(existing) => {
                if existing.matches(candidate.decision, &candidate.note) {
                    return Ok(request);
                }
                return Err(FleetError::conflict("approval.duplicate_decision", format!("{} already decided gate {} differently", existing.approver_user_id, existing.gate)));
            }
        }

        self.recompute_and_store(request_id).await
    }

    pub async fn cancel(&self, request_id: &RequestId, actor_user_id: &UserId) -> Result<ApprovalRequest> {
        let request = self.approvals.get(request_id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id.as_str()))?;

        if request.status != RequestStatus::Pending {
            return Err(FleetError::conflict("approval.request_not_pending", format!("request {request_id} is {:?}", request.status)));
        }
        let is_requester = &request.requester_user_id == actor_user_id;
        let is_sys_admin = self.authz.has_role(actor_user_id, "SYS_ADMIN").await?;
        if !is_requester && !is_sys_admin {
            return Err(FleetError::Forbidden { code: "approval.cancel_not_permitted", detail: format!("{actor_user_id} may not cancel request {request_id}") });
        }

        self.transition_terminal(request_id, RequestStatus::Cancelled).await
    }

    pub async fn expire(&self, request_id: &RequestId, now: DateTime<Utc>) -> Result<ApprovalRequest> {
        let request = self.approvals.get(request_id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id.as_str()))?;

        if request.status != RequestStatus::Pending {
            return Err(FleetError::conflict("approval.request_not_pending", format!("request {request_id} is {:?}", request.status)));
        }
        if now - request.created_at <= self.expiry_window {
            return Err(FleetError::validation("approval.not_yet_expired", format!("request {request_id} has not exceeded its expiry window")));
        }

        self.transition_terminal(request_id, RequestStatus::Expired).await
    }

    async fn transition_terminal(&self, request_id: &RequestId, status: RequestStatus) -> Result<ApprovalRequest> {
        let mutator: crate::store::Mutator = Arc::new(move |request: &mut ApprovalRequest| {
            request.status = status;
            request.updated_at = Utc::now();
        });
        let updated = self.compare_and_swap_with_retry(request_id, mutator).await?;
        self.publish_if_terminal(&updated).await;
        Ok(updated)
    }

    async fn recompute_and_store(&self, request_id: &RequestId) -> Result<ApprovalRequest> {
        let decisions = self.decisions.list_for_request(request_id).await?;
        let request = self.approvals.get(request_id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id.as_str()))?;
        let (status, counts) = recompute(&request.required, &decisions);

        let mutator: crate::store::Mutator = Arc::new(move |request: &mut ApprovalRequest| {
            request.status = status;
            request.counts = counts.clone();
            request.updated_at = Utc::now();
        });
        let updated = self.compare_and_swap_with_retry(request_id, mutator).await?;

        self.publish_if_terminal(&updated).await;
        Ok(updated)
    }

    /// Retries the conditional update up to `MAX_CAS_ATTEMPTS` times with a
    /// short jittered backoff on version conflicts, then surfaces
    /// `Conflict` tagged `Contention` (spec §4.2).
    async fn compare_and_swap_with_retry(&self, request_id: &RequestId, mutator: crate::store::Mutator) -> Result<ApprovalRequest> {
        for attempt in 0..MAX_CAS_ATTEMPTS {
            let request = self.approvals.get(request_id).await?.ok_or_else(|| FleetError::not_found("approval.request_not_found", request_id.as_str()))?;
            let expected_version = request.version;

            match self.approvals.compare_and_swap(request_id, expected_version, mutator.clone()).await {
                Ok(updated) => return Ok(updated),
                Err(FleetError::Conflict { code: "approval.version_mismatch", .. }) if attempt + 1 < MAX_CAS_ATTEMPTS => {
                    tracing::debug!(%request_id, attempt, "approval.compare_and_swap_retry");
                    tokio::time::sleep(jittered_backoff(attempt)).await;
                }
                Err(FleetError::Conflict { code: "approval.version_mismatch", .. }) => {
                    return Err(FleetError::conflict("approval.contention", format!("request {request_id} exceeded compare-and-swap retries")));
                }
                Err(err) => return Err(err),
            }
        }
        Err(FleetError::conflict("approval.contention", format!("request {request_id} exceeded compare-and-swap retries")))
    }

    async fn publish_if_terminal(&self, request: &ApprovalRequest) {
        if !request.status.is_terminal() {
            return;
        }
        let payload = serde_json::json!({
            "requestId": request.id.as_str(),
            "status": format!("{:?}", request.status).to_uppercase(),
            "version": request.version,
        });
        let Ok(bytes) = serde_json::to_vec(&payload) else {
            tracing::error!(request_id = %request.id, "approval.finalized_event_serialize_failed");
            return;
        };
        if let Err(err) = self.broker.publish(&self.finalized_topic, request.id.as_str(), bytes).await {
            tracing::error!(request_id = %request.id, error = %err, "approval.finalized_event_publish_failed");
        }
    }
}

fn jittered_backoff(attempt: u32) -> Duration {
    let base = CAS_BASE_BACKOFF * 2u32.saturating_pow(attempt);
    fleetctl_core::governance::retry::RetryPolicy { max_attempts: MAX_CAS_ATTEMPTS, initial_delay: base, multiplier: 1.0, jitter_factor: 0.3 }.backoff_for(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowAllAuthz;
    use crate::store::{InMemoryApprovalStore, InMemoryDecisionStore};
    use fleetctl_broker::InMemoryBroker;
    use fleetctl_core::ids::GateName;

    fn harness() -> ApprovalAggregate {
        ApprovalAggregate::new(
            Arc::new(InMemoryApprovalStore::new()),
            Arc::new(InMemoryDecisionStore::new()),
            Arc::new(AllowAllAuthz),
            Arc::new(InMemoryBroker::new(1)),
            ChronoDuration::hours(24),
        )
    }

    /// Spec §8 scenario 3: both gates approved in turn.
    #[tokio::test]
    async fn approval_path_reaches_approved_after_both_gates_clear() {
        let aggregate = harness();
        let snapshot = DecisionSnapshot { manager_id: Some(UserId::from("mgr-1")), ..Default::default() };
        let request = aggregate.create(UserId::from("requester"), RequestType::TransferOwnership, ApprovalTarget::default(), snapshot).await.unwrap();

        let after_first = aggregate
            .record_decision(&request.id, UserId::from("sa1"), GateName::from("SYS_ADMIN"), Decision::Approve, None)
            .await
            .unwrap();
        assert_eq!(after_first.status, RequestStatus::Pending);
        assert_eq!(after_first.counts.get("SYS_ADMIN"), Some(&1));
        assert_eq!(after_first.version, 1);

        let after_second = aggregate
            .record_decision(&request.id, UserId::from("lm1"), GateName::from("LINE_MANAGER"), Decision::Approve, None)
            .await
            .unwrap();
        assert_eq!(after_second.status, RequestStatus::Approved);
        assert_eq!(after_second.version, 2);
    }

    /// Spec §8 scenario 4: a single reject on a non-overridable gate settles
    /// the request immediately; further decisions are rejected as Conflict.
    #[tokio::test]
    async fn reject_path_settles_and_blocks_further_decisions() {
        let aggregate = harness();
        let snapshot = DecisionSnapshot { manager_id: Some(UserId::from("mgr-1")), ..Default::default() };
        let request = aggregate.create(UserId::from("requester"), RequestType::TransferOwnership, ApprovalTarget::default(), snapshot).await.unwrap();

        let rejected = aggregate
            .record_decision(&request.id, UserId::from("sa1"), GateName::from("SYS_ADMIN"), Decision::Reject, None)
            .await
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.version, 1);

        let err = aggregate
            .record_decision(&request.id, UserId::from("lm1"), GateName::from("LINE_MANAGER"), Decision::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "approval.request_not_pending");
    }

    /// Spec §8 scenario 5: an identical repeated decision is absorbed
    /// idempotently with no state change.
    #[tokio::test]
    async fn duplicate_decision_is_absorbed_idempotently() {
        let aggregate = harness();
        let request = aggregate.create(UserId::from("requester"), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default()).await.unwrap();

        let first = aggregate
            .record_decision(&request.id, UserId::from("sa1"), GateName::from("SYS_ADMIN"), Decision::Approve, Some("looks fine".into()))
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.status, RequestStatus::Approved);

        let second = aggregate
            .record_decision(&request.id, UserId::from("sa1"), GateName::from("SYS_ADMIN"), Decision::Approve, Some("looks fine".into()))
            .await
            .unwrap();
        assert_eq!(second.version, 1, "duplicate decision must not bump the version");
    }

    #[tokio::test]
    async fn decision_on_a_gate_not_required_by_the_request_is_rejected() {
        let aggregate = harness();
        let request = aggregate.create(UserId::from("requester"), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default()).await.unwrap();

        let err = aggregate
            .record_decision(&request.id, UserId::from("lm1"), GateName::from("LINE_MANAGER"), Decision::Approve, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "approval.gate_not_required");
    }

    #[tokio::test]
    async fn cancel_is_permitted_for_the_requester() {
        let aggregate = harness();
        let requester = UserId::from("requester");
        let request = aggregate.create(requester.clone(), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default()).await.unwrap();

        let cancelled = aggregate.cancel(&request.id, &requester).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn expire_rejects_a_request_inside_its_window() {
        let aggregate = harness();
        let request = aggregate.create(UserId::from("requester"), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default()).await.unwrap();

        let err = aggregate.expire(&request.id, Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), "approval.not_yet_expired");
    }

    #[tokio::test]
    async fn expire_settles_a_request_past_its_window() {
        let aggregate = harness();
        let request = aggregate.create(UserId::from("requester"), RequestType::ClaimOwnership, ApprovalTarget::default(), DecisionSnapshot::default()).await.unwrap();

        let future = request.created_at + ChronoDuration::hours(48);
        let expired = aggregate.expire(&request.id, future).await.unwrap();
        assert_eq!(expired.status, RequestStatus::Expired);
    }
}
