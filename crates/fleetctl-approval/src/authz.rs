//! `Authz`: the external authorization collaborator (spec §6 "only the
//! security predicates consumed by the core are specified" — the realm
//! setup, RBAC storage, and admin UI that back it are explicitly out of
//! scope, per §1).

use crate::types::ApprovalRequest;
use async_trait::async_trait;
use fleetctl_core::error::Result;
use fleetctl_core::ids::{GateName, UserId};

#[async_trait]
pub trait Authz: Send + Sync {
    /// Whether `approver` may record a decision for `gate` on `request`.
    async fn is_authorized_for_gate(&self, approver: &UserId, gate: &GateName, request: &ApprovalRequest) -> Result<bool>;

    /// Whether `user` holds the named role, used by `cancel`'s
    /// requester-or-`SYS_ADMIN` check (spec §4.2).
    async fn has_role(&self, user: &UserId, role: &str) -> Result<bool>;
}

/// A permissive stand-in for tests and local composition: every gate and
/// role check passes. Production wiring supplies a real `Authz`
/// implementation backed by the (out-of-scope) RBAC store.
pub struct AllowAllAuthz;

#[async_trait]
impl Authz for AllowAllAuthz {
    async fn is_authorized_for_gate(&self, _approver: &UserId, _gate: &GateName, _request: &ApprovalRequest) -> Result<bool> {
        Ok(true)
    }

    async fn has_role(&self, _user: &UserId, _role: &str) -> Result<bool> {
        Ok(true)
    }
}
