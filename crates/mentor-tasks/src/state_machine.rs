//! Task state machine with validated transitions.
//!
//! Pending -> Running -> Succeeded/Failed. Terminal states are final.

use crate::error::TaskError;
use crate::types::TaskStatus;

/// Validate that a status transition is allowed.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    let valid = matches!(
        (from, to),
        (TaskStatus::Pending, TaskStatus::Running)
            | (TaskStatus::Running, TaskStatus::Succeeded)
            | (TaskStatus::Running, TaskStatus::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Succeeded,
        TaskStatus::Failed,
    ];

    #[test]
    fn test_pending_to_running() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Running).is_ok());
    }

    #[test]
    fn test_running_to_terminal() {
        assert!(validate_transition(TaskStatus::Running, TaskStatus::Succeeded).is_ok());
        assert!(validate_transition(TaskStatus::Running, TaskStatus::Failed).is_ok());
    }

    #[test]
    fn test_pending_cannot_skip_running() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Succeeded).is_err());
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Failed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [TaskStatus::Succeeded, TaskStatus::Failed] {
            for to in ALL {
                assert!(
                    validate_transition(from, to).is_err(),
                    "{} -> {} should be rejected",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for s in ALL {
            assert!(validate_transition(s, s).is_err());
        }
    }

    #[test]
    fn test_error_names_both_states() {
        let err = validate_transition(TaskStatus::Running, TaskStatus::Pending).unwrap_err();
        assert!(matches!(
            err,
            TaskError::InvalidTransition(TaskStatus::Running, TaskStatus::Pending)
        ));
    }
}
