//! Timeout and garbage-collection supervisor.
//!
//! Live waiters already time out on their own precise deadline inside
//! `request_human_input`; the sweep here is the backstop that closes
//! requests whose waiter task vanished, and it garbage-collects terminal
//! execution handles and closed request tombstones after the retention
//! window. Worst-case expiry overshoot for an orphaned request is one
//! sweep interval.

use crate::manager::ConsultationManager;
use parley_core::error::ParleyError;
use parley_core::logging::{AuditCategory, AuditEvent};
use parley_core::types::{ConsultationId, ExecutionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message sent when the sweep expires a consultation.
#[derive(Debug, Clone)]
pub struct SweepEvent {
    /// The request that was expired.
    pub request_id: ConsultationId,
    /// The execution that was paused on it.
    pub execution_id: ExecutionId,
}

/// Background processor for consultation expiry and registry GC.
pub struct TimeoutSupervisor {
    manager: Arc<ConsultationManager>,
    sweep_interval: Duration,
    retention: Duration,
    running: Arc<AtomicBool>,
    event_tx: Option<mpsc::Sender<SweepEvent>>,
}

impl TimeoutSupervisor {
    /// Create a supervisor using the manager's configured intervals.
    pub fn new(manager: Arc<ConsultationManager>) -> Self {
        let sweep_interval = manager.config().sweep_interval;
        let retention = manager.config().retention;
        Self {
            manager,
            sweep_interval,
            retention,
            running: Arc::new(AtomicBool::new(false)),
            event_tx: None,
        }
    }

    /// Override the sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set an event sender for expiry notifications.
    #[must_use]
    pub fn with_event_sender(mut self, tx: mpsc::Sender<SweepEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Check if the supervisor is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the supervisor until `stop()` is called.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            interval_ms = self.sweep_interval.as_millis() as u64,
            "Timeout supervisor started"
        );

        while self.running.load(Ordering::SeqCst) {
            self.sweep().await;
            tokio::time::sleep(self.sweep_interval).await;
        }

        tracing::info!("Timeout supervisor stopped");
    }

    /// Stop the supervisor after the current sweep.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One pass: expire overdue requests, then collect garbage.
    pub async fn sweep(&self) {
        for request_id in self.manager.store().expired_open() {
            match self.manager.expire_consultation(request_id) {
                Ok(request) => {
                    if let Some(tx) = &self.event_tx {
                        let event = SweepEvent {
                            request_id,
                            execution_id: request.execution_id,
                        };
                        if tx.send(event).await.is_err() {
                            tracing::warn!(
                                request_id = %request_id,
                                "Failed to send sweep event - channel closed"
                            );
                        }
                    }
                }
                // A resolution, cancellation or the waiter's own deadline
                // won the close race between our scan and this call.
                Err(ParleyError::AlreadyClosed { .. }) | Err(ParleyError::NotFound { .. }) => {
                    tracing::debug!(
                        request_id = %request_id,
                        "Expiry sweep lost close race"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        request_id = %request_id,
                        error = %err,
                        "Failed to expire consultation"
                    );
                }
            }
        }

        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        let removed_requests = self.manager.store().remove_closed_before(cutoff);
        let removed_handles = self.manager.states().remove_terminal_before(cutoff);
        if removed_requests > 0 || removed_handles > 0 {
            self.manager.audit().record(
                AuditEvent::debug(AuditCategory::Supervisor, "Garbage collected")
                    .with_field("requests", removed_requests.to_string())
                    .with_field("handles", removed_handles.to_string()),
            );
            tracing::debug!(
                requests = removed_requests,
                handles = removed_handles,
                "Supervisor garbage collection"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use parley_core::consultation::CloseReason;
    use parley_core::types::AgentId;
    use serde_json::json;

    #[tokio::test]
    async fn sweep_expires_overdue_request() {
        let manager = Arc::new(ConsultationManager::new(EngineConfig::default()));
        let execution = manager.begin(AgentId::new());

        // Open an already-overdue request directly through the store; no
        // waiter is attached, mimicking an orphaned suspension.
        let request = manager
            .store()
            .open(execution.id, json!(null), Duration::ZERO)
            .unwrap();
        assert_eq!(manager.store().open_count(), 1);

        let (tx, mut rx) = mpsc::channel(8);
        let supervisor = TimeoutSupervisor::new(manager.clone()).with_event_sender(tx);
        supervisor.sweep().await;

        assert_eq!(manager.store().open_count(), 0);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.request_id, request.id);
        assert_eq!(event.execution_id, execution.id);

        assert!(matches!(
            manager.store().get_request(request.id).unwrap().closed,
            Some(CloseReason::Expired)
        ));
    }

    #[tokio::test]
    async fn sweep_ignores_unexpired_requests() {
        let manager = Arc::new(ConsultationManager::new(EngineConfig::default()));
        let execution = manager.begin(AgentId::new());
        manager
            .store()
            .open(execution.id, json!(null), Duration::from_secs(3600))
            .unwrap();

        let supervisor = TimeoutSupervisor::new(manager.clone());
        supervisor.sweep().await;

        assert_eq!(manager.store().open_count(), 1);
    }

    #[tokio::test]
    async fn sweep_collects_terminal_handles_after_retention() {
        let config = EngineConfig::default().with_retention(Duration::ZERO);
        let manager = Arc::new(ConsultationManager::new(config));
        let execution = manager.begin(AgentId::new());
        manager.complete(execution.id).unwrap();

        let supervisor = TimeoutSupervisor::new(manager.clone());
        supervisor.sweep().await;

        assert!(manager.execution(execution.id).is_none());
    }

    #[tokio::test]
    async fn run_and_stop() {
        let manager = Arc::new(ConsultationManager::new(EngineConfig::default()));
        let supervisor = Arc::new(
            TimeoutSupervisor::new(manager).with_sweep_interval(Duration::from_millis(5)),
        );

        let handle = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.run().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(supervisor.is_running());
        supervisor.stop();
        handle.await.unwrap();
        assert!(!supervisor.is_running());
    }
}
