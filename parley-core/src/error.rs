//! Error types for Parley.
//!
//! This module provides strongly-typed errors with actionable context.
//! All errors include the relevant identifiers (execution ID,
//! consultation ID, current state) so that collaborator layers can render
//! a precise diagnostic without re-querying the engine.

use crate::state::{ExecutionEvent, ExecutionState};
use crate::types::{ConsultationId, ExecutionId};
use thiserror::Error;

/// The main error type for Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    // =========================================================================
    // State Machine Errors (E100-E199)
    // =========================================================================
    /// The event is not legal in the execution's current state.
    #[error("E101: Illegal transition for {execution_id}: '{event}' not permitted in state '{state}'")]
    InvalidTransition {
        /// The execution whose transition was rejected.
        execution_id: ExecutionId,
        /// The state the execution was in when the event arrived.
        state: ExecutionState,
        /// The rejected event.
        event: ExecutionEvent,
    },

    /// The transition carried a version that no longer matches the handle.
    ///
    /// Raised when two transition attempts race on the same execution;
    /// the loser observes this and must re-read before retrying.
    #[error("E102: Stale state for {execution_id}: expected version {expected}, found {actual}")]
    StaleState {
        /// The execution whose transition was rejected.
        execution_id: ExecutionId,
        /// The version the caller expected to transition from.
        expected: u64,
        /// The handle's actual version.
        actual: u64,
    },

    /// No execution is registered under this ID.
    #[error("E103: Execution {execution_id} not found")]
    ExecutionNotFound {
        /// The unknown execution ID.
        execution_id: ExecutionId,
    },

    /// A consultation was requested for an execution that is not RUNNING.
    #[error("E104: Execution {execution_id} is not running (state '{state}')")]
    NotRunning {
        /// The execution that cannot pause.
        execution_id: ExecutionId,
        /// Its current state.
        state: ExecutionState,
    },

    // =========================================================================
    // Consultation Store Errors (E200-E299)
    // =========================================================================
    /// The execution already has an open consultation request.
    #[error("E201: Execution {execution_id} already has open consultation {request_id}")]
    AlreadyOpen {
        /// The execution that tried to open a second request.
        execution_id: ExecutionId,
        /// The request that is already open.
        request_id: ConsultationId,
    },

    /// No open consultation exists under this request ID.
    ///
    /// Also returned to a resolution submitted after the request was
    /// closed by expiry or cancellation: the late submitter must not be
    /// able to distinguish "never existed" from "you lost the race".
    #[error("E202: Consultation {request_id} not found or no longer open")]
    NotFound {
        /// The unknown (or already-closed) request ID.
        request_id: ConsultationId,
    },

    /// The consultation was already closed.
    ///
    /// Raised on a second `expire` of the same request; the supervisor
    /// swallows it, other callers may surface it as a conflict.
    #[error("E203: Consultation {request_id} is already closed")]
    AlreadyClosed {
        /// The closed request ID.
        request_id: ConsultationId,
    },

    // =========================================================================
    // Coordination Errors (E300-E399)
    // =========================================================================
    /// The execution was cancelled while (or before) awaiting a decision.
    #[error("E301: Execution {execution_id} was cancelled")]
    Cancelled {
        /// The cancelled execution.
        execution_id: ExecutionId,
    },
}

impl ParleyError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "E101",
            Self::StaleState { .. } => "E102",
            Self::ExecutionNotFound { .. } => "E103",
            Self::NotRunning { .. } => "E104",
            Self::AlreadyOpen { .. } => "E201",
            Self::NotFound { .. } => "E202",
            Self::AlreadyClosed { .. } => "E203",
            Self::Cancelled { .. } => "E301",
        }
    }

    /// Check if this error means "the thing you addressed is gone".
    ///
    /// Transport layers typically map these to 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ExecutionNotFound { .. } | Self::NotFound { .. })
    }

    /// Check if this error is a lost race rather than a caller bug.
    ///
    /// Transport layers typically map these to 409.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::StaleState { .. } | Self::AlreadyOpen { .. } | Self::AlreadyClosed { .. }
        )
    }
}

/// Result type alias using `ParleyError`.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = ParleyError::NotRunning {
            execution_id: ExecutionId::new(),
            state: ExecutionState::Completed,
        };
        assert_eq!(err.code(), "E104");

        let err = ParleyError::NotFound {
            request_id: ConsultationId::new(),
        };
        assert_eq!(err.code(), "E202");
    }

    #[test]
    fn error_display_carries_context() {
        let id = ExecutionId::new();
        let err = ParleyError::InvalidTransition {
            execution_id: id,
            state: ExecutionState::Cancelled,
            event: ExecutionEvent::Cancel,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("E101"));
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("cancelled"));
    }

    #[test]
    fn classification_helpers() {
        assert!(
            ParleyError::NotFound {
                request_id: ConsultationId::new()
            }
            .is_not_found()
        );
        assert!(
            ParleyError::AlreadyClosed {
                request_id: ConsultationId::new()
            }
            .is_conflict()
        );
        assert!(
            !ParleyError::Cancelled {
                execution_id: ExecutionId::new()
            }
            .is_conflict()
        );
    }
}
