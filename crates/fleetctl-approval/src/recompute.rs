//! `recompute` (spec §4.2): pure, deterministic — given the same required
//! gates and the same multiset of decisions, it always yields the same
//! `(status, counts)` regardless of decision order (spec §8 "Aggregate
//! determinism").

use crate::types::{ApprovalDecision, ApprovalGate, Decision};
use fleetctl_core::model::RequestStatus;
use std::collections::HashMap;

pub fn recompute(required: &[ApprovalGate], decisions: &[ApprovalDecision]) -> (RequestStatus, HashMap<String, u32>) {
    let mut counts = HashMap::with_capacity(required.len());
    let mut any_rejected = false;

    for gate in required {
        let approves = decisions.iter().filter(|d| d.gate == gate.gate && d.decision == Decision::Approve).count() as u32;
        let rejects = decisions.iter().filter(|d| d.gate == gate.gate && d.decision == Decision::Reject).count() as u32;
        counts.insert(gate.gate.as_str().to_owned(), approves);

        let rejection_threshold = if gate.non_overridable { 1 } else { gate.override_threshold.unwrap_or(gate.min_approvals) };
        if rejects >= rejection_threshold {
            any_rejected = true;
        }
    }

    if any_rejected {
        return (RequestStatus::Rejected, counts);
    }

    let all_approved = required.iter().all(|gate| {
        let approves = counts.get(gate.gate.as_str()).copied().unwrap_or(0);
        approves >= gate.min_approvals
    });

    let status = if all_approved { RequestStatus::Approved } else { RequestStatus::Pending };
    (status, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetctl_core::ids::{DecisionId, GateName, RequestId, UserId};

    fn decision(gate: &str, approver: &str, decision: Decision) -> ApprovalDecision {
        ApprovalDecision {
            id: DecisionId::generate(),
            request_id: RequestId::generate(),
            approver_user_id: UserId::from(approver),
            gate: GateName::from(gate),
            decision,
            decided_at: Utc::now(),
            note: None,
        }
    }

    fn two_gates() -> Vec<ApprovalGate> {
        vec![ApprovalGate::new("SYS_ADMIN", 1), ApprovalGate::new("LINE_MANAGER", 1)]
    }

    #[test]
    fn stays_pending_until_every_gate_clears() {
        let decisions = vec![decision("SYS_ADMIN", "sa1", Decision::Approve)];
        let (status, counts) = recompute(&two_gates(), &decisions);
        assert_eq!(status, RequestStatus::Pending);
        assert_eq!(counts.get("SYS_ADMIN"), Some(&1));
    }

    #[test]
    fn approves_once_every_gate_meets_its_threshold() {
        let decisions = vec![decision("SYS_ADMIN", "sa1", Decision::Approve), decision("LINE_MANAGER", "lm1", Decision::Approve)];
        let (status, _) = recompute(&two_gates(), &decisions);
        assert_eq!(status, RequestStatus::Approved);
    }

    #[test]
    fn a_single_reject_on_a_non_overridable_gate_rejects_the_request() {
        let decisions = vec![decision("SYS_ADMIN", "sa1", Decision::Reject)];
        let (status, _) = recompute(&two_gates(), &decisions);
        assert_eq!(status, RequestStatus::Rejected);
    }

    #[test]
    fn an_overridable_gate_needs_override_threshold_rejects() {
        let mut gates = two_gates();
        gates[0].non_overridable = false;
        gates[0].override_threshold = Some(2);

        let one_reject = vec![decision("SYS_ADMIN", "sa1", Decision::Reject)];
        let (status, _) = recompute(&gates, &one_reject);
        assert_eq!(status, RequestStatus::Pending);

        let two_rejects = vec![decision("SYS_ADMIN", "sa1", Decision::Reject), decision("SYS_ADMIN", "sa2", Decision::Reject)];
        let (status, _) = recompute(&gates, &two_rejects);
        assert_eq!(status, RequestStatus::Rejected);
    }

    #[test]
    fn result_is_independent_of_decision_order() {
        let forward = vec![decision("SYS_ADMIN", "sa1", Decision::Approve), decision("LINE_MANAGER", "lm1", Decision::Approve)];
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(recompute(&two_gates(), &forward), recompute(&two_gates(), &backward));
    }
}
