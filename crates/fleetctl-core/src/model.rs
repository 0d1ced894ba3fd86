//! Small shared enums reused by both the approval aggregate and the batch
//! consumer state machine, kept in one place the way the teacher keeps
//! `kernel::model::{State, Status}` as the single source of truth instead of
//! letting every module declare a parallel enum.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a batch moving through the heartbeat consumer
/// (spec §4.1 "State machine of a batch").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BatchState {
    Received,
    Processing,
    RetryScheduled,
    DlqRouted,
    Committed,
}

impl BatchState {
    /// Terminal states never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Committed)
    }
}

/// Lifecycle status of an `ApprovalRequest` aggregate (spec §3/§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}
