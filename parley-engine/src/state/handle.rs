//! Execution handle and snapshot types.

use chrono::{DateTime, Utc};
use parley_core::state::ExecutionState;
use parley_core::types::{AgentId, ExecutionId};
use serde::Serialize;

/// Live per-execution record owned by the state manager.
///
/// Never leaves the registry; readers get an [`ExecutionSnapshot`].
#[derive(Debug)]
pub(crate) struct ExecutionHandle {
    pub(crate) id: ExecutionId,
    pub(crate) agent_id: AgentId,
    pub(crate) state: ExecutionState,
    /// Bumped on every successful transition; the CAS token.
    pub(crate) version: u64,
    /// When the current state was entered. Drives terminal GC.
    pub(crate) entered_at: DateTime<Utc>,
    pub(crate) cancel_requested: bool,
    pub(crate) failure: Option<String>,
}

impl ExecutionHandle {
    pub(crate) fn new(agent_id: AgentId) -> Self {
        Self {
            id: ExecutionId::new(),
            agent_id,
            state: ExecutionState::Running,
            version: 0,
            entered_at: Utc::now(),
            cancel_requested: false,
            failure: None,
        }
    }

    pub(crate) fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            id: self.id,
            agent_id: self.agent_id,
            state: self.state,
            version: self.version,
            entered_at: self.entered_at,
            cancel_requested: self.cancel_requested,
            failure: self.failure.clone(),
        }
    }
}

/// Owned, point-in-time view of an execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSnapshot {
    /// The execution's unique ID.
    pub id: ExecutionId,
    /// The agent that owns this execution.
    pub agent_id: AgentId,
    /// State at snapshot time.
    pub state: ExecutionState,
    /// Version at snapshot time; pass this to `transition`.
    pub version: u64,
    /// When the current state was entered.
    pub entered_at: DateTime<Utc>,
    /// Whether cancellation has been requested.
    pub cancel_requested: bool,
    /// Failure detail, set once the execution reaches FAILED.
    pub failure: Option<String>,
}
