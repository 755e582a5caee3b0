//! The pause → publish → wait → resolve → resume orchestration.
//!
//! [`ConsultationManager`] is the only component that touches both the
//! state registry and the consultation store. An agent task calls
//! [`request_human_input`](ConsultationManager::request_human_input) and
//! suspends on a oneshot channel; a reviewer (or the timeout path, or a
//! cancellation) closes the store entry and fires exactly one wake signal
//! into that channel. The store's exact-once closure is what guarantees
//! the three wake signals are mutually exclusive.

use crate::config::EngineConfig;
use crate::consultation::{ConsultationStore, MemoryConsultationStore};
use crate::state::{AgentStateManager, ExecutionSnapshot};
use parking_lot::Mutex;
use parley_core::consultation::{
    CloseReason, ConsultationOutcome, ConsultationRequest, Resolution,
};
use parley_core::error::{ParleyError, Result};
use parley_core::logging::{AuditCategory, AuditEvent, AuditSink, BufferedAuditLog};
use parley_core::state::{ExecutionEvent, ExecutionState};
use parley_core::types::{AgentId, ConsultationId, ExecutionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// The wake signal delivered to a suspended caller.
///
/// Exactly one of these is sent per consultation; mutual exclusion comes
/// from the store's close-once discipline.
#[derive(Debug)]
enum WakeSignal {
    Resolved(Resolution),
    Expired,
    Cancelled,
}

/// Coordinates consultations between agent tasks and human reviewers.
///
/// Construct one per process (or per test) and share it via `Arc`; all
/// methods take `&self`.
pub struct ConsultationManager {
    states: Arc<AgentStateManager>,
    store: Arc<dyn ConsultationStore>,
    waiters: Mutex<HashMap<ConsultationId, oneshot::Sender<WakeSignal>>>,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
}

impl ConsultationManager {
    /// Create a manager with an in-memory store and buffered audit log.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            states: Arc::new(AgentStateManager::new()),
            store: Arc::new(MemoryConsultationStore::new()),
            waiters: Mutex::new(HashMap::new()),
            audit: Arc::new(BufferedAuditLog::with_default_capacity()),
            config,
        }
    }

    /// Replace the consultation store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConsultationStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The state registry (read access for status inspection).
    pub fn states(&self) -> &Arc<AgentStateManager> {
        &self.states
    }

    /// The consultation store (read access for status inspection).
    pub fn store(&self) -> &Arc<dyn ConsultationStore> {
        &self.store
    }

    /// The audit sink.
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Register a new execution for an agent, starting in RUNNING.
    pub fn begin(&self, agent_id: AgentId) -> ExecutionSnapshot {
        let snapshot = self.states.register(agent_id);
        self.audit.record(
            AuditEvent::info(AuditCategory::Execution, "Execution registered")
                .with_execution_id(snapshot.id),
        );
        snapshot
    }

    /// Read-only snapshot of an execution.
    pub fn execution(&self, execution_id: ExecutionId) -> Option<ExecutionSnapshot> {
        self.states.get(execution_id)
    }

    /// The open consultation of an execution, if any. Read-only.
    pub fn open_consultation(&self, execution_id: ExecutionId) -> Option<ConsultationRequest> {
        self.store.get(execution_id)
    }

    /// Suspend the calling agent task until a human decides.
    ///
    /// Transitions RUNNING → PAUSED_FOR_CONSULTATION, opens a request
    /// with deadline `now + timeout` (falling back to the configured
    /// default), and parks the caller on a wake channel. Returns
    /// [`ConsultationOutcome::Resolved`] when a reviewer answered in
    /// time, [`ConsultationOutcome::TimedOut`] when the deadline elapsed,
    /// and `Err(Cancelled)` when the execution was cancelled while
    /// suspended. In the first two cases the execution is RUNNING again
    /// on return.
    ///
    /// Fails with `NotRunning` when the execution is not in RUNNING —
    /// including the loser of two concurrent calls on the same execution.
    pub async fn request_human_input(
        &self,
        execution_id: ExecutionId,
        prompt: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<ConsultationOutcome> {
        let snapshot = self
            .states
            .get(execution_id)
            .ok_or(ParleyError::ExecutionNotFound { execution_id })?;
        if snapshot.state != ExecutionState::Running {
            return Err(ParleyError::NotRunning {
                execution_id,
                state: snapshot.state,
            });
        }

        let paused = match self.states.transition(
            execution_id,
            snapshot.version,
            ExecutionEvent::RequestConsultation,
        ) {
            Ok(snap) => snap,
            Err(ParleyError::StaleState { .. }) | Err(ParleyError::InvalidTransition { .. }) => {
                // A concurrent transition won; report the state it left.
                let state = self
                    .states
                    .get(execution_id)
                    .map(|s| s.state)
                    .unwrap_or(snapshot.state);
                return Err(ParleyError::NotRunning {
                    execution_id,
                    state,
                });
            }
            Err(err) => return Err(err),
        };

        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let request = match self.store.open(execution_id, prompt, timeout) {
            Ok(request) => request,
            Err(err) => {
                // Paused with no open request would strand the execution;
                // fail it so the registry reflects reality.
                let _ = self.states.transition(
                    execution_id,
                    paused.version,
                    ExecutionEvent::Fail {
                        cause: err.to_string(),
                    },
                );
                return Err(err);
            }
        };

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(request.id, tx);

        // The request is globally visible from `open`, so a resolver (or a
        // cancellation, or the sweep) can close it before the insert above
        // lands, finding no waiter to wake. Re-check and re-derive the
        // signal from the close reason; if the waiter is already gone the
        // closer did see it and the signal is in flight.
        if let Some(reason) = self.store.get_request(request.id).and_then(|req| req.closed) {
            if let Some(tx) = self.waiters.lock().remove(&request.id) {
                let signal = match reason {
                    CloseReason::Resolved(resolution) => WakeSignal::Resolved(resolution),
                    CloseReason::Expired => WakeSignal::Expired,
                    CloseReason::Cancelled => WakeSignal::Cancelled,
                };
                let _ = tx.send(signal);
            }
        }

        self.audit.record(
            AuditEvent::info(AuditCategory::Consultation, "Consultation opened")
                .with_execution_id(execution_id)
                .with_request_id(request.id)
                .with_field("timeout_ms", timeout.as_millis().to_string()),
        );
        tracing::info!(
            execution_id = %execution_id,
            request_id = %request.id,
            timeout_ms = timeout.as_millis() as u64,
            "Execution paused for consultation"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        let signal = self.suspend(request.id, rx, deadline).await;

        match signal {
            WakeSignal::Resolved(resolution) => {
                self.acknowledge(execution_id, paused.version, ExecutionEvent::ResolutionReceived)?;
                tracing::info!(
                    execution_id = %execution_id,
                    request_id = %request.id,
                    resolver = %resolution.resolver,
                    "Execution resumed with resolution"
                );
                Ok(ConsultationOutcome::Resolved(resolution))
            }
            WakeSignal::Expired => {
                self.acknowledge(execution_id, paused.version, ExecutionEvent::TimeoutExpired)?;
                tracing::warn!(
                    execution_id = %execution_id,
                    request_id = %request.id,
                    "Execution resumed after consultation timeout"
                );
                Ok(ConsultationOutcome::TimedOut)
            }
            WakeSignal::Cancelled => {
                tracing::info!(
                    execution_id = %execution_id,
                    request_id = %request.id,
                    "Suspended caller woken by cancellation"
                );
                Err(ParleyError::Cancelled { execution_id })
            }
        }
    }

    /// Park on the wake channel, racing the request's own deadline.
    ///
    /// When the deadline fires first the caller attempts to close the
    /// request itself; losing that close race means a resolution or
    /// cancellation won and its signal is already in flight, so we fall
    /// back to the channel.
    async fn suspend(
        &self,
        request_id: ConsultationId,
        mut rx: oneshot::Receiver<WakeSignal>,
        deadline: tokio::time::Instant,
    ) -> WakeSignal {
        tokio::select! {
            signal = &mut rx => signal.unwrap_or(WakeSignal::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                match self.expire_consultation(request_id) {
                    Ok(_) => WakeSignal::Expired,
                    Err(_) => rx.await.unwrap_or(WakeSignal::Cancelled),
                }
            }
        }
    }

    /// PAUSED → RESUMING → RUNNING once the caller has its signal.
    ///
    /// `paused_version` is the version recorded at pause time; only
    /// cancellation or failure can have bumped it since, so a stale CAS
    /// here means the execution is terminal.
    fn acknowledge(
        &self,
        execution_id: ExecutionId,
        paused_version: u64,
        event: ExecutionEvent,
    ) -> Result<()> {
        let resuming = match self.states.transition(execution_id, paused_version, event) {
            Ok(snap) => snap,
            Err(ParleyError::StaleState { .. }) => {
                return Err(ParleyError::Cancelled { execution_id });
            }
            Err(err) => return Err(err),
        };
        self.states.transition(
            execution_id,
            resuming.version,
            ExecutionEvent::ResumeAcknowledged,
        )?;
        Ok(())
    }

    /// Deliver a human resolution to a pending request.
    ///
    /// Closes the store entry and wakes the suspended caller. Fails with
    /// `NotFound` when the request is unknown or already closed (expired,
    /// cancelled or previously resolved) — the transport layer can
    /// consult [`ConsultationStore::get_request`] to render the closed
    /// cases distinctly.
    ///
    /// `Ok` means the resolution closed the request and will be delivered
    /// to the suspended caller; it does not guarantee the execution acts
    /// on it. A cancellation racing the wake-up can still win the
    /// execution's state, in which case the caller observes `Cancelled`
    /// and the verdict is discarded. Callers that need the execution's
    /// fate should watch [`execution`](Self::execution).
    pub fn submit_resolution(
        &self,
        request_id: ConsultationId,
        resolution: Resolution,
    ) -> Result<()> {
        let request = self.store.resolve(request_id, resolution.clone())?;

        if let Some(tx) = self.waiters.lock().remove(&request_id) {
            // Receiver gone means the caller future was dropped; the
            // store entry is closed either way.
            let _ = tx.send(WakeSignal::Resolved(resolution.clone()));
        }

        self.audit.record(
            AuditEvent::info(AuditCategory::Consultation, "Consultation resolved")
                .with_execution_id(request.execution_id)
                .with_request_id(request_id)
                .with_field("resolver", resolution.resolver),
        );
        Ok(())
    }

    /// Close an overdue request and wake its waiter with the timeout
    /// signal. Called by the suspended caller's own deadline and by the
    /// supervisor sweep; losers of the close race get
    /// `AlreadyClosed`/`NotFound`.
    pub(crate) fn expire_consultation(
        &self,
        request_id: ConsultationId,
    ) -> Result<ConsultationRequest> {
        let request = self.store.expire(request_id)?;

        if let Some(tx) = self.waiters.lock().remove(&request_id) {
            let _ = tx.send(WakeSignal::Expired);
        }

        self.audit.record(
            AuditEvent::warn(AuditCategory::Consultation, "Consultation expired")
                .with_execution_id(request.execution_id)
                .with_request_id(request_id),
        );
        Ok(request)
    }

    /// Cancel an execution.
    ///
    /// Forces RUNNING or PAUSED_FOR_CONSULTATION into CANCELLED, closes
    /// any open consultation and wakes a suspended caller immediately.
    /// Idempotent on an already-cancelled execution; fails with
    /// `InvalidTransition` on COMPLETED/FAILED and on the transient
    /// RESUMING state (the caller is already awake there).
    pub fn cancel(&self, execution_id: ExecutionId) -> Result<()> {
        loop {
            let snapshot = self
                .states
                .get(execution_id)
                .ok_or(ParleyError::ExecutionNotFound { execution_id })?;

            match snapshot.state {
                ExecutionState::Cancelled => return Ok(()),
                ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Resuming => {
                    return Err(ParleyError::InvalidTransition {
                        execution_id,
                        state: snapshot.state,
                        event: ExecutionEvent::Cancel,
                    });
                }
                ExecutionState::Running | ExecutionState::PausedForConsultation => {}
            }

            match self
                .states
                .transition(execution_id, snapshot.version, ExecutionEvent::Cancel)
            {
                Ok(_) => {
                    self.close_and_wake(execution_id, CloseReason::Cancelled);
                    self.audit.record(
                        AuditEvent::info(AuditCategory::Execution, "Execution cancelled")
                            .with_execution_id(execution_id),
                    );
                    tracing::info!(execution_id = %execution_id, "Execution cancelled");
                    return Ok(());
                }
                Err(ParleyError::StaleState { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Mark a RUNNING execution as successfully finished.
    pub fn complete(&self, execution_id: ExecutionId) -> Result<ExecutionSnapshot> {
        let snapshot = self
            .states
            .get(execution_id)
            .ok_or(ParleyError::ExecutionNotFound { execution_id })?;
        let done =
            self.states
                .transition(execution_id, snapshot.version, ExecutionEvent::Complete)?;
        self.audit.record(
            AuditEvent::info(AuditCategory::Execution, "Execution completed")
                .with_execution_id(execution_id),
        );
        Ok(done)
    }

    /// Mark an execution as failed, recording the cause.
    ///
    /// Legal from any live state; failing a paused execution closes its
    /// open consultation and wakes the suspended caller.
    pub fn fail(
        &self,
        execution_id: ExecutionId,
        cause: impl Into<String>,
    ) -> Result<ExecutionSnapshot> {
        let cause = cause.into();
        loop {
            let snapshot = self
                .states
                .get(execution_id)
                .ok_or(ParleyError::ExecutionNotFound { execution_id })?;

            match self.states.transition(
                execution_id,
                snapshot.version,
                ExecutionEvent::Fail {
                    cause: cause.clone(),
                },
            ) {
                Ok(failed) => {
                    self.close_and_wake(execution_id, CloseReason::Cancelled);
                    self.audit.record(
                        AuditEvent::error(AuditCategory::Execution, "Execution failed")
                            .with_execution_id(execution_id)
                            .with_field("cause", cause),
                    );
                    return Ok(failed);
                }
                Err(ParleyError::StaleState { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the open request of an execution (if any) and deliver the
    /// cancellation wake signal.
    fn close_and_wake(&self, execution_id: ExecutionId, reason: CloseReason) {
        if let Some(request) = self.store.close_for_execution(execution_id, reason) {
            if let Some(tx) = self.waiters.lock().remove(&request.id) {
                let _ = tx.send(WakeSignal::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> ConsultationManager {
        ConsultationManager::new(EngineConfig::default())
    }

    #[tokio::test]
    async fn begin_and_complete() {
        let manager = manager();
        let execution = manager.begin(AgentId::new());
        assert_eq!(execution.state, ExecutionState::Running);

        let done = manager.complete(execution.id).unwrap();
        assert_eq!(done.state, ExecutionState::Completed);
    }

    #[tokio::test]
    async fn complete_twice_is_rejected() {
        let manager = manager();
        let execution = manager.begin(AgentId::new());
        manager.complete(execution.id).unwrap();

        let err = manager.complete(execution.id).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn request_on_unknown_execution() {
        let manager = manager();
        let err = manager
            .request_human_input(ExecutionId::new(), json!(null), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::ExecutionNotFound { .. }));
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let manager = manager();
        let execution = manager.begin(AgentId::new());

        manager.cancel(execution.id).unwrap();
        manager.cancel(execution.id).unwrap();
        assert_eq!(
            manager.execution(execution.id).unwrap().state,
            ExecutionState::Cancelled
        );
    }

    #[tokio::test]
    async fn cancel_of_completed_is_rejected() {
        let manager = manager();
        let execution = manager.begin(AgentId::new());
        manager.complete(execution.id).unwrap();

        let err = manager.cancel(execution.id).unwrap_err();
        assert!(matches!(err, ParleyError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn fail_records_cause_and_is_terminal() {
        let manager = manager();
        let execution = manager.begin(AgentId::new());

        let failed = manager.fail(execution.id, "tool exploded").unwrap();
        assert_eq!(failed.state, ExecutionState::Failed);
        assert_eq!(failed.failure.as_deref(), Some("tool exploded"));

        let err = manager.fail(execution.id, "again").unwrap_err();
        assert!(matches!(err, ParleyError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn submit_resolution_for_unknown_request() {
        let manager = manager();
        let err = manager
            .submit_resolution(ConsultationId::new(), Resolution::approved("a"))
            .unwrap_err();
        assert!(matches!(err, ParleyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn accepted_resolution_can_lose_the_state_race_to_cancel() {
        let manager = Arc::new(manager());
        let execution = manager.begin(AgentId::new());

        let waiter = tokio::spawn({
            let manager = manager.clone();
            let execution_id = execution.id;
            async move {
                manager
                    .request_human_input(execution_id, json!(null), Some(Duration::from_secs(10)))
                    .await
            }
        });

        let request = loop {
            if let Some(request) = manager.open_consultation(execution.id) {
                break request;
            }
            tokio::task::yield_now().await;
        };

        // Close with a resolution, then cancel before the waiter task gets
        // scheduled again; on the current-thread runtime nothing runs
        // between these two calls.
        manager
            .submit_resolution(request.id, Resolution::approved("alice"))
            .unwrap();
        manager.cancel(execution.id).unwrap();

        // The accepted resolution only closed the request; the execution's
        // fate was cancellation and the waiter surfaces it.
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, ParleyError::Cancelled { .. }));
        assert_eq!(
            manager.execution(execution.id).unwrap().state,
            ExecutionState::Cancelled
        );
    }
}
