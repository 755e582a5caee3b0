//! Agent execution state registry.
//!
//! [`AgentStateManager`] owns the state field of every execution handle;
//! no other component mutates it. Transitions are optimistic: each call
//! carries the version it expects to transition from, so two concurrent
//! attempts on the same execution can never both succeed.

mod handle;

pub use handle::ExecutionSnapshot;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use handle::ExecutionHandle;
use parley_core::error::{ParleyError, Result};
use parley_core::state::ExecutionEvent;
use parley_core::types::{AgentId, ExecutionId};

/// Registry of execution handles with linearizable per-key transitions.
///
/// Backed by a sharded map: operations on different execution IDs never
/// serialize against each other, while the entry lock makes transitions
/// on one execution totally ordered.
#[derive(Debug, Default)]
pub struct AgentStateManager {
    executions: DashMap<ExecutionId, ExecutionHandle>,
}

impl AgentStateManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution in RUNNING at version 0.
    pub fn register(&self, agent_id: AgentId) -> ExecutionSnapshot {
        let handle = ExecutionHandle::new(agent_id);
        let snapshot = handle.snapshot();
        self.executions.insert(handle.id, handle);
        tracing::debug!(
            execution_id = %snapshot.id,
            agent_id = %agent_id,
            "Execution registered"
        );
        snapshot
    }

    /// Read-only snapshot of an execution.
    pub fn get(&self, execution_id: ExecutionId) -> Option<ExecutionSnapshot> {
        self.executions.get(&execution_id).map(|h| h.snapshot())
    }

    /// Attempt a state transition.
    ///
    /// Fails with `ExecutionNotFound` for unknown IDs, `StaleState` when
    /// `expected_version` no longer matches (a concurrent transition
    /// won), and `InvalidTransition` for events the current state does
    /// not accept. On any failure the handle is left untouched.
    pub fn transition(
        &self,
        execution_id: ExecutionId,
        expected_version: u64,
        event: ExecutionEvent,
    ) -> Result<ExecutionSnapshot> {
        let mut entry = self
            .executions
            .get_mut(&execution_id)
            .ok_or(ParleyError::ExecutionNotFound { execution_id })?;

        if entry.version != expected_version {
            return Err(ParleyError::StaleState {
                execution_id,
                expected: expected_version,
                actual: entry.version,
            });
        }

        let next = entry
            .state
            .apply(&event)
            .ok_or_else(|| ParleyError::InvalidTransition {
                execution_id,
                state: entry.state,
                event: event.clone(),
            })?;

        // All checks passed; mutate in one go.
        let from = entry.state;
        entry.state = next;
        entry.version += 1;
        entry.entered_at = Utc::now();
        match &event {
            ExecutionEvent::Fail { cause } => entry.failure = Some(cause.clone()),
            ExecutionEvent::Cancel => entry.cancel_requested = true,
            _ => {}
        }

        tracing::debug!(
            execution_id = %execution_id,
            from = %from,
            to = %next,
            event = %event,
            version = entry.version,
            "Execution transitioned"
        );

        Ok(entry.snapshot())
    }

    /// Remove terminal handles whose last transition predates `cutoff`.
    ///
    /// Returns the number of handles removed. Called by the supervisor
    /// after the retention grace period.
    pub fn remove_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.executions.len();
        self.executions
            .retain(|_, handle| !(handle.state.is_terminal() && handle.entered_at < cutoff));
        // Registrations may land concurrently with the retain pass.
        before.saturating_sub(self.executions.len())
    }

    /// Number of tracked executions.
    pub fn len(&self) -> usize {
        self.executions.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::state::ExecutionState;

    #[test]
    fn register_starts_running() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());
        assert_eq!(snap.state, ExecutionState::Running);
        assert_eq!(snap.version, 0);
    }

    #[test]
    fn transition_bumps_version() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());

        let paused = states
            .transition(snap.id, snap.version, ExecutionEvent::RequestConsultation)
            .unwrap();
        assert_eq!(paused.state, ExecutionState::PausedForConsultation);
        assert_eq!(paused.version, 1);
    }

    #[test]
    fn stale_version_is_rejected() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());

        states
            .transition(snap.id, snap.version, ExecutionEvent::RequestConsultation)
            .unwrap();

        // Second attempt with the original version loses.
        let err = states
            .transition(snap.id, snap.version, ExecutionEvent::RequestConsultation)
            .unwrap_err();
        assert!(matches!(err, ParleyError::StaleState { actual: 1, .. }));

        // State unchanged by the failed attempt.
        assert_eq!(
            states.get(snap.id).unwrap().state,
            ExecutionState::PausedForConsultation
        );
    }

    #[test]
    fn invalid_transition_leaves_state_unchanged() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());

        let err = states
            .transition(snap.id, snap.version, ExecutionEvent::ResolutionReceived)
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidTransition { .. }));

        let after = states.get(snap.id).unwrap();
        assert_eq!(after.state, ExecutionState::Running);
        assert_eq!(after.version, 0);
    }

    #[test]
    fn unknown_execution() {
        let states = AgentStateManager::new();
        let err = states
            .transition(ExecutionId::new(), 0, ExecutionEvent::Complete)
            .unwrap_err();
        assert!(matches!(err, ParleyError::ExecutionNotFound { .. }));
    }

    #[test]
    fn fail_records_cause() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());

        let failed = states
            .transition(
                snap.id,
                snap.version,
                ExecutionEvent::Fail {
                    cause: "tool crashed".to_string(),
                },
            )
            .unwrap();
        assert_eq!(failed.state, ExecutionState::Failed);
        assert_eq!(failed.failure.as_deref(), Some("tool crashed"));
    }

    #[test]
    fn cancel_sets_flag() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());

        let cancelled = states
            .transition(snap.id, snap.version, ExecutionEvent::Cancel)
            .unwrap();
        assert!(cancelled.cancel_requested);
        assert_eq!(cancelled.state, ExecutionState::Cancelled);
    }

    #[test]
    fn terminal_gc_respects_grace() {
        let states = AgentStateManager::new();
        let snap = states.register(AgentId::new());
        states
            .transition(snap.id, snap.version, ExecutionEvent::Complete)
            .unwrap();

        // Cutoff in the past keeps the fresh terminal handle.
        let kept = states.remove_terminal_before(Utc::now() - chrono::Duration::seconds(60));
        assert_eq!(kept, 0);
        assert_eq!(states.len(), 1);

        // Cutoff in the future collects it.
        let removed = states.remove_terminal_before(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(removed, 1);
        assert!(states.is_empty());
    }

    #[test]
    fn live_handles_survive_gc() {
        let states = AgentStateManager::new();
        states.register(AgentId::new());

        let removed = states.remove_terminal_before(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(removed, 0);
        assert_eq!(states.len(), 1);
    }
}
