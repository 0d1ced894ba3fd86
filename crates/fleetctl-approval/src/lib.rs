//! Multi-gate approval aggregate and state machine (spec §4.2): gate
//! derivation, decision recording with compound-unique idempotency, a pure
//! recompute function, and optimistic-concurrency persistence.

pub mod aggregate;
pub mod authz;
pub mod error;
pub mod expiry;
pub mod gates;
pub mod mongo;
pub mod recompute;
pub mod store;
pub mod types;

pub use aggregate::ApprovalAggregate;
pub use authz::{AllowAllAuthz, Authz};
pub use error::ApprovalBackendError;
pub use expiry::ExpirySweeper;
pub use gates::required_gates;
pub use mongo::{MongoApprovalStore, MongoDecisionStore};
pub use recompute::recompute;
pub use store::{ApprovalStore, DecisionStore, InMemoryApprovalStore, InMemoryDecisionStore, InsertOutcome, Mutator};
pub use types::{
    ApplicationService, ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalTarget, Decision, DecisionSnapshot, GrantToType, Lifecycle, Permission, RequestType, ServiceShare,
};
