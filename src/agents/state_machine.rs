// Agentic task status state machine with validation

use super::AgenticTaskStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: AgenticTaskStatus,
        to: AgenticTaskStatus,
    },

    #[error("Task already in terminal state: {0}")]
    AlreadyTerminal(AgenticTaskStatus),
}

/// Validates if a task can move from one status to another.
///
/// Status only advances; there are no resets or retries.
pub fn can_transition(from: AgenticTaskStatus, to: AgenticTaskStatus) -> bool {
    use AgenticTaskStatus::*;

    matches!(
        (from, to),
        (Planning, PendingApproval)
            | (Planning, Failed)
            | (PendingApproval, Running)
            | (PendingApproval, Denied)
            | (Running, Completed)
            | (Running, Failed)
    )
}

/// Validates and performs a state transition
pub fn transition_state(
    current: AgenticTaskStatus,
    target: AgenticTaskStatus,
) -> Result<AgenticTaskStatus, StateTransitionError> {
    if is_terminal_state(current) {
        return Err(StateTransitionError::AlreadyTerminal(current));
    }
    if !can_transition(current, target) {
        return Err(StateTransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }
    Ok(target)
}

pub fn is_terminal_state(status: AgenticTaskStatus) -> bool {
    matches!(
        status,
        AgenticTaskStatus::Completed | AgenticTaskStatus::Failed | AgenticTaskStatus::Denied
    )
}

/// Get all valid next states from current state
pub fn valid_next_states(current: AgenticTaskStatus) -> Vec<AgenticTaskStatus> {
    [
        AgenticTaskStatus::Planning,
        AgenticTaskStatus::PendingApproval,
        AgenticTaskStatus::Running,
        AgenticTaskStatus::Completed,
        AgenticTaskStatus::Failed,
        AgenticTaskStatus::Denied,
    ]
    .into_iter()
    .filter(|&state| can_transition(current, state))
    .collect()
}
