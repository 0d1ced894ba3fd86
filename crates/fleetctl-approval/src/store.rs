//! `ApprovalStore` / `DecisionStore`: the two persistence seams (spec §6
//! "Persisted state layout"). In-memory implementations back the contract
//! test suite; `mongo.rs` provides the production-shaped counterparts.

use crate::types::{ApprovalDecision, ApprovalRequest};
use async_trait::async_trait;
use dashmap::DashMap;
use fleetctl_core::error::{FleetError, Result};
use fleetctl_core::ids::RequestId;

/// Outcome of a decision insert: distinguishes a fresh record from a
/// duplicate-key hit on the `(requestId, approverUserId, gate)` index, so
/// the caller can apply the idempotent-absorb rule (spec §4.2) without a
/// separate existence probe racing the insert itself.
pub enum InsertOutcome {
    Inserted,
    Duplicate(ApprovalDecision),
}

/// Mutates a loaded aggregate in place before it is written back under
/// optimistic concurrency. `Fn` rather than `FnOnce` (and `Arc`-wrapped
/// rather than boxed) so the same mutator can be reapplied across the
/// bounded compare-and-swap retries in `ApprovalAggregate` without the
/// caller needing to rebuild a fresh closure per attempt.
pub type Mutator = std::sync::Arc<dyn Fn(&mut ApprovalRequest) + Send + Sync>;

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn insert(&self, request: ApprovalRequest) -> Result<()>;

    async fn get(&self, id: &RequestId) -> Result<Option<ApprovalRequest>>;

    /// Conditional update: applies `mutator` to the stored aggregate iff its
    /// stored `version` equals `expected_version`, persisting the mutated
    /// aggregate with `version := expected_version + 1`. Returns
    /// `FleetError::Conflict` (code `"approval.version_mismatch"`) when the
    /// stored version has moved on, and `FleetError::NotFound` when the
    /// aggregate no longer exists — callers retry on the former per spec
    /// §4.2's bounded-retry contention rule.
    async fn compare_and_swap(&self, id: &RequestId, expected_version: u64, mutator: Mutator) -> Result<ApprovalRequest>;

    /// Every aggregate still in `Pending`, used by the expiry sweep (spec
    /// §4.2 `expire`) to find candidates without the caller tracking ids.
    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>>;
}

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn insert(&self, decision: ApprovalDecision) -> Result<InsertOutcome>;

    async fn list_for_request(&self, request_id: &RequestId) -> Result<Vec<ApprovalDecision>>;
}

#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: DashMap<String, ApprovalRequest>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn insert(&self, request: ApprovalRequest) -> Result<()> {
        self.requests.insert(request.id.as_str().to_owned(), request);
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.get(id.as_str()).map(|r| r.clone()))
    }

    async fn compare_and_swap(&self, id: &RequestId, expected_version: u64, mutator: Mutator) -> Result<ApprovalRequest> {
        let mut entry = self
            .requests
            .get_mut(id.as_str())
            .ok_or_else(|| FleetError::not_found("approval.request_not_found", id.as_str()))?;

        if entry.version != expected_version {
            return Err(FleetError::conflict("approval.version_mismatch", format!("expected version {expected_version}, stored version {}", entry.version)));
        }

        mutator(&mut entry);
        entry.version = expected_version + 1;
        Ok(entry.clone())
    }

    async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        Ok(self.requests.iter().filter(|entry| entry.status == fleetctl_core::model::RequestStatus::Pending).map(|entry| entry.clone()).collect())
    }
}

/// Keyed by `(requestId, approverUserId, gate)` to emulate the compound
/// unique index from spec §6 without a real database.
#[derive(Default)]
pub struct InMemoryDecisionStore {
    decisions: DashMap<(String, String, String), ApprovalDecision>,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(decision: &ApprovalDecision) -> (String, String, String) {
        (decision.request_id.as_str().to_owned(), decision.approver_user_id.as_str().to_owned(), decision.gate.as_str().to_owned())
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn insert(&self, decision: ApprovalDecision) -> Result<InsertOutcome> {
        let key = Self::key(&decision);
        match self.decisions.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Ok(InsertOutcome::Duplicate(existing.get().clone())),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(decision);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn list_for_request(&self, request_id: &RequestId) -> Result<Vec<ApprovalDecision>> {
        Ok(self.decisions.iter().filter(|entry| entry.key().0 == request_id.as_str()).map(|entry| entry.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApprovalTarget, Decision, DecisionSnapshot};
    use chrono::Utc;
    use fleetctl_core::ids::{DecisionId, GateName, UserId};
    use fleetctl_core::model::RequestStatus;

    fn request() -> ApprovalRequest {
        ApprovalRequest {
            id: RequestId::generate(),
            requester_user_id: UserId::from("u1"),
            request_type: crate::types::RequestType::ClaimOwnership,
            target: ApprovalTarget::default(),
            required: vec![],
            status: RequestStatus::Pending,
            snapshot: DecisionSnapshot::default(),
            counts: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn list_pending_excludes_terminal_requests() {
        let store = InMemoryApprovalStore::new();
        let pending = request();
        let mut terminal = request();
        terminal.status = RequestStatus::Cancelled;
        store.insert(pending.clone()).await.unwrap();
        store.insert(terminal).await.unwrap();

        let listed = store.list_pending().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, pending.id);
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_a_stale_version() {
        let store = InMemoryApprovalStore::new();
        let req = request();
        let id = req.id.clone();
        store.insert(req).await.unwrap();

        let err = store.compare_and_swap(&id, 99, std::sync::Arc::new(|_: &mut ApprovalRequest| {})).await.unwrap_err();
        assert_eq!(err.code(), "approval.version_mismatch");
    }

    #[tokio::test]
    async fn inserting_a_duplicate_key_returns_the_existing_decision() {
        let store = InMemoryDecisionStore::new();
        let decision = ApprovalDecision {
            id: DecisionId::generate(),
            request_id: RequestId::generate(),
            approver_user_id: UserId::from("sa1"),
            gate: GateName::from("SYS_ADMIN"),
            decision: Decision::Approve,
            decided_at: Utc::now(),
            note: None,
        };

        assert!(matches!(store.insert(decision.clone()).await.unwrap(), InsertOutcome::Inserted));

        let mut repeat = decision.clone();
        repeat.id = DecisionId::generate();
        match store.insert(repeat).await.unwrap() {
            InsertOutcome::Duplicate(existing) => assert_eq!(existing.id, decision.id),
            InsertOutcome::Inserted => panic!("expected a duplicate"),
        }
    }
}
