//! Approval domain value types (spec §3), using the shared `kernel::ids`
//! newtypes rather than bare strings so a misplaced `approver_user_id` /
//! `request_id` swap fails to compile instead of corrupting a decision
//! record at runtime.

use chrono::{DateTime, Utc};
use fleetctl_core::ids::{GateName, RequestId, ServiceId, TeamId, UserId};
use fleetctl_core::model::RequestStatus;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifecycle {
    Active,
    Deprecated,
    Retired,
}

/// Aggregate root for a registered service (spec §3 `ApplicationService`).
/// Owned by this crate only insofar as `ApprovalRequest.target` references
/// it; the service registry itself lives outside this crate's scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationService {
    pub id: ServiceId,
    pub display_name: String,
    pub owner_team_id: Option<TeamId>,
    pub environments: HashSet<String>,
    pub tags: HashSet<String>,
    pub lifecycle: Lifecycle,
    pub repo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantToType {
    Team,
    User,
}

/// Permission kinds a `ServiceShare` can grant. The spec names the field as
/// `set<enum>` without enumerating members; this is the minimal set that
/// covers the REST surface's read/mutate/ownership-adjacent actions (see
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceShare {
    pub id: String,
    pub service_id: ServiceId,
    pub grant_to_type: GrantToType,
    pub grant_to_id: String,
    pub permissions: HashSet<Permission>,
    pub environments: Option<HashSet<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum RequestType {
    ClaimOwnership,
    TransferOwnership,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTarget {
    pub service_id: Option<ServiceId>,
    pub team_id: Option<TeamId>,
}

/// A frozen snapshot of organizational facts `requiredGates` and `Authz`
/// consult, taken at request-creation time so a later org-chart change
/// cannot retroactively alter which gates a request needs (spec §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSnapshot {
    pub team_ids: Vec<TeamId>,
    pub manager_id: Option<UserId>,
    pub roles: Vec<String>,
}

/// One required sign-off gate, with the non-overridable / override-threshold
/// flag resolving the spec's "should a SYS_ADMIN override change rejection
/// semantics" open question (see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub gate: GateName,
    pub min_approvals: u32,
    /// When `true` (the default), a single REJECT decision on this gate
    /// rejects the whole request. When `false`, rejection instead requires
    /// `rejects(gate) >= override_threshold` (falling back to
    /// `min_approvals` when unset).
    pub non_overridable: bool,
    pub override_threshold: Option<u32>,
}

impl ApprovalGate {
    pub fn new(gate: impl Into<GateName>, min_approvals: u32) -> Self {
        Self { gate: gate.into(), min_approvals, non_overridable: true, override_threshold: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub requester_user_id: UserId,
    pub request_type: RequestType,
    pub target: ApprovalTarget,
    pub required: Vec<ApprovalGate>,
    pub status: RequestStatus,
    pub snapshot: DecisionSnapshot,
    /// Approve-count per gate name, refreshed on every `recompute` (spec §3
    /// `counts: mapping<gateName,int>`; reject counts are derived from the
    /// decision store directly rather than duplicated here).
    pub counts: HashMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

/// Append-only decision event (spec §3 `ApprovalDecision`). Never updated or
/// deleted once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub id: fleetctl_core::ids::DecisionId,
    pub request_id: RequestId,
    pub approver_user_id: UserId,
    pub gate: GateName,
    pub decision: Decision,
    pub decided_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl ApprovalDecision {
    /// Two decisions are equivalent for idempotent-absorb purposes when
    /// they agree on the `(decision, note)` pair (spec §4.2).
    pub fn matches(&self, decision: Decision, note: &Option<String>) -> bool {
        self.decision == decision && &self.note == note
    }
}
