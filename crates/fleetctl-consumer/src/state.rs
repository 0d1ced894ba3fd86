//! The batch state machine (spec §4.1 "State machine of a batch"):
//! `RECEIVED -> PROCESSING -> {COMMITTED | RETRY_SCHEDULED -> PROCESSING |
//! DLQ_ROUTED -> COMMITTED}`.

use fleetctl_core::error::{FleetError, Result};
use fleetctl_core::model::BatchState;

/// Tracks one batch's progress through its lifecycle and rejects any
/// transition the FSM doesn't allow, so a logic error trips a loud `Fatal`
/// rather than silently corrupting the commit sequence.
pub struct BatchStateMachine {
    current: BatchState,
}

impl BatchStateMachine {
    pub fn new() -> Self {
        Self { current: BatchState::Received }
    }

    pub fn current(&self) -> BatchState {
        self.current
    }

    pub fn transition(&mut self, next: BatchState) -> Result<()> {
        let allowed = matches!(
            (self.current, next),
            (BatchState::Received, BatchState::Processing)
                | (BatchState::Processing, BatchState::Committed)
                | (BatchState::Processing, BatchState::RetryScheduled)
                | (BatchState::RetryScheduled, BatchState::Processing)
                | (BatchState::Processing, BatchState::DlqRouted)
                | (BatchState::DlqRouted, BatchState::Committed)
        );
        if !allowed {
            return Err(FleetError::Fatal {
                code: "consumer.invalid_state_transition",
                detail: format!("{:?} -> {:?} is not a legal batch transition", self.current, next),
            });
        }
        self.current = next;
        Ok(())
    }
}

impl Default for BatchStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_commits() {
        let mut fsm = BatchStateMachine::new();
        fsm.transition(BatchState::Processing).unwrap();
        fsm.transition(BatchState::Committed).unwrap();
        assert!(fsm.current().is_terminal());
    }

    #[test]
    fn retry_then_dlq_route_then_commit() {
        let mut fsm = BatchStateMachine::new();
        fsm.transition(BatchState::Processing).unwrap();
        fsm.transition(BatchState::RetryScheduled).unwrap();
        fsm.transition(BatchState::Processing).unwrap();
        fsm.transition(BatchState::DlqRouted).unwrap();
        fsm.transition(BatchState::Committed).unwrap();
        assert!(fsm.current().is_terminal());
    }

    #[test]
    fn skipping_processing_is_rejected() {
        let mut fsm = BatchStateMachine::new();
        let err = fsm.transition(BatchState::Committed).unwrap_err();
        assert_eq!(err.code(), "consumer.invalid_state_transition");
    }
}
