//! The per-execution state machine.
//!
//! `ExecutionState::apply` is the single source of truth for which
//! transitions are legal. It is a pure function: illegal (state, event)
//! pairs return `None` and the caller maps that to an
//! `InvalidTransition` error without mutating anything.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// The agent task is executing.
    Running,
    /// The task is suspended, waiting on a human decision.
    PausedForConsultation,
    /// A decision (or timeout) arrived; the caller is consuming it.
    Resuming,
    /// Terminal: the task finished successfully.
    Completed,
    /// Terminal: the task failed.
    Failed,
    /// Terminal: the task was cancelled from outside.
    Cancelled,
}

impl ExecutionState {
    /// Whether this state accepts no further events.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::PausedForConsultation => "paused_for_consultation",
            Self::Resuming => "resuming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Compute the successor state for an event.
    ///
    /// Returns `None` when the event is not legal in this state. The
    /// table is intentionally exhaustive so that adding a state or event
    /// forces a review of every pair.
    #[must_use]
    pub fn apply(&self, event: &ExecutionEvent) -> Option<ExecutionState> {
        use ExecutionEvent as E;
        use ExecutionState as S;

        match (self, event) {
            (S::Running, E::RequestConsultation) => Some(S::PausedForConsultation),
            (S::Running, E::Complete) => Some(S::Completed),
            (S::Running, E::Cancel) => Some(S::Cancelled),
            (S::Running, E::Fail { .. }) => Some(S::Failed),

            (S::PausedForConsultation, E::ResolutionReceived) => Some(S::Resuming),
            (S::PausedForConsultation, E::TimeoutExpired) => Some(S::Resuming),
            (S::PausedForConsultation, E::Cancel) => Some(S::Cancelled),
            (S::PausedForConsultation, E::Fail { .. }) => Some(S::Failed),

            (S::Resuming, E::ResumeAcknowledged) => Some(S::Running),
            (S::Resuming, E::Fail { .. }) => Some(S::Failed),

            // Terminal states accept nothing; everything else is illegal.
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event driving an execution state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// The agent task asked for human input.
    RequestConsultation,
    /// A human resolution arrived for the open consultation.
    ResolutionReceived,
    /// The open consultation's deadline elapsed unanswered.
    TimeoutExpired,
    /// The caller consumed the resolution and continues.
    ResumeAcknowledged,
    /// The execution was cancelled from outside.
    Cancel,
    /// The agent task finished.
    Complete,
    /// The agent task failed.
    Fail {
        /// Human-readable failure detail, recorded on the handle.
        cause: String,
    },
}

impl ExecutionEvent {
    /// Get the string representation of the event kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestConsultation => "request_consultation",
            Self::ResolutionReceived => "resolution_received",
            Self::TimeoutExpired => "timeout_expired",
            Self::ResumeAcknowledged => "resume_acknowledged",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
            Self::Fail { .. } => "fail",
        }
    }
}

impl fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_states() -> Vec<ExecutionState> {
        use ExecutionState as S;
        vec![
            S::Running,
            S::PausedForConsultation,
            S::Resuming,
            S::Completed,
            S::Failed,
            S::Cancelled,
        ]
    }

    fn all_events() -> Vec<ExecutionEvent> {
        use ExecutionEvent as E;
        vec![
            E::RequestConsultation,
            E::ResolutionReceived,
            E::TimeoutExpired,
            E::ResumeAcknowledged,
            E::Cancel,
            E::Complete,
            E::Fail {
                cause: "boom".to_string(),
            },
        ]
    }

    #[test]
    fn legal_transitions() {
        use ExecutionEvent as E;
        use ExecutionState as S;

        assert_eq!(
            S::Running.apply(&E::RequestConsultation),
            Some(S::PausedForConsultation)
        );
        assert_eq!(
            S::PausedForConsultation.apply(&E::ResolutionReceived),
            Some(S::Resuming)
        );
        assert_eq!(
            S::PausedForConsultation.apply(&E::TimeoutExpired),
            Some(S::Resuming)
        );
        assert_eq!(S::Resuming.apply(&E::ResumeAcknowledged), Some(S::Running));
        assert_eq!(S::Running.apply(&E::Complete), Some(S::Completed));
        assert_eq!(S::Running.apply(&E::Cancel), Some(S::Cancelled));
        assert_eq!(
            S::PausedForConsultation.apply(&E::Cancel),
            Some(S::Cancelled)
        );
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for state in all_states().into_iter().filter(ExecutionState::is_terminal) {
            for event in all_events() {
                assert_eq!(state.apply(&event), None, "{state} must reject {event}");
            }
        }
    }

    #[test]
    fn transition_table_totality() {
        // Every (state, event) pair either maps to exactly the table in
        // the design or is rejected; count the legal pairs to catch
        // accidental additions.
        let mut legal = 0;
        for state in all_states() {
            for event in all_events() {
                if state.apply(&event).is_some() {
                    legal += 1;
                }
            }
        }
        assert_eq!(legal, 10);
    }

    #[test]
    fn illegal_examples() {
        use ExecutionEvent as E;
        use ExecutionState as S;

        assert_eq!(S::Running.apply(&E::ResolutionReceived), None);
        assert_eq!(S::Running.apply(&E::ResumeAcknowledged), None);
        assert_eq!(S::PausedForConsultation.apply(&E::RequestConsultation), None);
        assert_eq!(S::Resuming.apply(&E::Cancel), None);
        assert_eq!(S::Resuming.apply(&E::Complete), None);
    }

    #[test]
    fn fail_is_legal_from_all_live_states() {
        use ExecutionEvent as E;
        use ExecutionState as S;

        let fail = E::Fail {
            cause: "oops".to_string(),
        };
        assert_eq!(S::Running.apply(&fail), Some(S::Failed));
        assert_eq!(S::PausedForConsultation.apply(&fail), Some(S::Failed));
        assert_eq!(S::Resuming.apply(&fail), Some(S::Failed));
    }
}
