//! `requiredGates` (spec §4.2): a pure function deriving the required
//! sign-off gates from `(requestType, target, snapshot)` alone — no I/O, no
//! clock reads, so the same inputs always produce the same gate list.

use crate::types::{ApprovalGate, ApprovalTarget, DecisionSnapshot, RequestType};

/// Claiming an orphaned service only ever needs platform sign-off: there is
/// no existing owning team whose line manager could be asked.
///
/// Transferring ownership additionally requires the target team's line
/// manager to sign off, when the snapshot names one — this is the literal
/// two-gate shape from the worked example (`SYS_ADMIN` + `LINE_MANAGER`,
/// each `minApprovals: 1`). When no manager is on file the transfer falls
/// back to `SYS_ADMIN`-only, since there is nobody else to ask.
pub fn required_gates(request_type: RequestType, _target: &ApprovalTarget, snapshot: &DecisionSnapshot) -> Vec<ApprovalGate> {
    match request_type {
        RequestType::ClaimOwnership => vec![ApprovalGate::new("SYS_ADMIN", 1)],
        RequestType::TransferOwnership => {
            let mut gates = vec![ApprovalGate::new("SYS_ADMIN", 1)];
            if snapshot.manager_id.is_some() {
                gates.push(ApprovalGate::new("LINE_MANAGER", 1));
            }
            gates
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_core::ids::UserId;

    #[test]
    fn claim_ownership_requires_only_sys_admin() {
        let gates = required_gates(RequestType::ClaimOwnership, &ApprovalTarget::default(), &DecisionSnapshot::default());
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].gate.as_str(), "SYS_ADMIN");
    }

    #[test]
    fn transfer_with_a_known_manager_requires_both_gates() {
        let snapshot = DecisionSnapshot { manager_id: Some(UserId::from("mgr-1")), ..Default::default() };
        let gates = required_gates(RequestType::TransferOwnership, &ApprovalTarget::default(), &snapshot);
        let names: Vec<&str> = gates.iter().map(|g| g.gate.as_str()).collect();
        assert_eq!(names, vec!["SYS_ADMIN", "LINE_MANAGER"]);
    }

    #[test]
    fn transfer_without_a_manager_falls_back_to_sys_admin_only() {
        let gates = required_gates(RequestType::TransferOwnership, &ApprovalTarget::default(), &DecisionSnapshot::default());
        assert_eq!(gates.len(), 1);
        assert_eq!(gates[0].gate.as_str(), "SYS_ADMIN");
    }

    #[test]
    fn is_deterministic_for_identical_inputs() {
        let snapshot = DecisionSnapshot { manager_id: Some(UserId::from("mgr-1")), ..Default::default() };
        let a = required_gates(RequestType::TransferOwnership, &ApprovalTarget::default(), &snapshot);
        let b = required_gates(RequestType::TransferOwnership, &ApprovalTarget::default(), &snapshot);
        assert_eq!(a, b);
    }
}
