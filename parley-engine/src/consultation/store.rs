//! Consultation store trait and in-memory implementation.
//!
//! The store owns the execution → open-request mapping and nothing else:
//! it never touches the state machine. Closing a request (resolve, expire
//! or cancel) mutates the record exactly once under the store lock, which
//! is what makes the resolve/expire tie-break race-free — whoever closes
//! first wins, every later attempt observes a closed record.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use parley_core::consultation::{CloseReason, ConsultationRequest, Resolution};
use parley_core::error::{ParleyError, Result};
use parley_core::types::{ConsultationId, ExecutionId};
use std::collections::HashMap;
use std::time::Duration;

/// Registry of pending (and recently closed) consultation requests.
pub trait ConsultationStore: Send + Sync {
    /// Open a request for an execution.
    ///
    /// Fails with `AlreadyOpen` if the execution already has an open
    /// request. The deadline is `now + timeout`.
    fn open(
        &self,
        execution_id: ExecutionId,
        prompt: serde_json::Value,
        timeout: Duration,
    ) -> Result<ConsultationRequest>;

    /// Close a request with a human resolution.
    ///
    /// Fails with `NotFound` if the request does not exist or is already
    /// closed — a late submitter cannot distinguish "never existed" from
    /// "lost the race". Returns the closed request.
    fn resolve(
        &self,
        request_id: ConsultationId,
        resolution: Resolution,
    ) -> Result<ConsultationRequest>;

    /// Close a request whose deadline passed without a resolution.
    ///
    /// Fails with `AlreadyClosed` if the request was closed by anyone
    /// (including a previous expiry — callers swallow that), `NotFound`
    /// for unknown IDs. Returns the closed request.
    fn expire(&self, request_id: ConsultationId) -> Result<ConsultationRequest>;

    /// Close the open request of an execution, if any.
    ///
    /// Used by the cancellation and failure paths; a no-op returning
    /// `None` when nothing is open.
    fn close_for_execution(
        &self,
        execution_id: ExecutionId,
        reason: CloseReason,
    ) -> Option<ConsultationRequest>;

    /// The open request for an execution, if any. Read-only.
    fn get(&self, execution_id: ExecutionId) -> Option<ConsultationRequest>;

    /// A request (open or closed) by its ID. Read-only.
    fn get_request(&self, request_id: ConsultationId) -> Option<ConsultationRequest>;

    /// IDs of open requests past their deadline.
    fn expired_open(&self) -> Vec<ConsultationId>;

    /// All open requests.
    fn list_open(&self) -> Vec<ConsultationRequest>;

    /// Number of open requests.
    fn open_count(&self) -> usize;

    /// Drop closed tombstones older than `cutoff`; returns the count.
    fn remove_closed_before(&self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
struct StoreInner {
    requests: HashMap<ConsultationId, ConsultationRequest>,
    /// Index of open requests only; an entry is removed the instant its
    /// request closes.
    open_by_execution: HashMap<ExecutionId, ConsultationId>,
}

/// In-memory consultation store.
///
/// The lock guards only map mutation; nothing waits while holding it.
#[derive(Debug, Default)]
pub struct MemoryConsultationStore {
    inner: RwLock<StoreInner>,
}

impl MemoryConsultationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsultationStore for MemoryConsultationStore {
    fn open(
        &self,
        execution_id: ExecutionId,
        prompt: serde_json::Value,
        timeout: Duration,
    ) -> Result<ConsultationRequest> {
        let mut inner = self.inner.write();

        if let Some(&request_id) = inner.open_by_execution.get(&execution_id) {
            return Err(ParleyError::AlreadyOpen {
                execution_id,
                request_id,
            });
        }

        let request = ConsultationRequest::new(execution_id, prompt, timeout);
        inner.open_by_execution.insert(execution_id, request.id);
        inner.requests.insert(request.id, request.clone());

        tracing::info!(
            execution_id = %execution_id,
            request_id = %request.id,
            deadline = %request.deadline,
            "Consultation opened"
        );
        Ok(request)
    }

    fn resolve(
        &self,
        request_id: ConsultationId,
        resolution: Resolution,
    ) -> Result<ConsultationRequest> {
        let mut inner = self.inner.write();

        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or(ParleyError::NotFound { request_id })?;

        if !request.is_open() {
            return Err(ParleyError::NotFound { request_id });
        }

        request.closed = Some(CloseReason::Resolved(resolution));
        request.closed_at = Some(Utc::now());
        let closed = request.clone();
        inner.open_by_execution.remove(&closed.execution_id);

        tracing::info!(
            execution_id = %closed.execution_id,
            request_id = %request_id,
            "Consultation resolved"
        );
        Ok(closed)
    }

    fn expire(&self, request_id: ConsultationId) -> Result<ConsultationRequest> {
        let mut inner = self.inner.write();

        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or(ParleyError::NotFound { request_id })?;

        if !request.is_open() {
            return Err(ParleyError::AlreadyClosed { request_id });
        }

        request.closed = Some(CloseReason::Expired);
        request.closed_at = Some(Utc::now());
        let closed = request.clone();
        inner.open_by_execution.remove(&closed.execution_id);

        tracing::info!(
            execution_id = %closed.execution_id,
            request_id = %request_id,
            "Consultation expired"
        );
        Ok(closed)
    }

    fn close_for_execution(
        &self,
        execution_id: ExecutionId,
        reason: CloseReason,
    ) -> Option<ConsultationRequest> {
        let mut inner = self.inner.write();

        let request_id = inner.open_by_execution.remove(&execution_id)?;
        let request = inner
            .requests
            .get_mut(&request_id)
            .expect("open index points at a stored request");
        request.closed = Some(reason);
        request.closed_at = Some(Utc::now());

        tracing::info!(
            execution_id = %execution_id,
            request_id = %request_id,
            "Consultation closed for execution"
        );
        Some(request.clone())
    }

    fn get(&self, execution_id: ExecutionId) -> Option<ConsultationRequest> {
        let inner = self.inner.read();
        let request_id = inner.open_by_execution.get(&execution_id)?;
        inner.requests.get(request_id).cloned()
    }

    fn get_request(&self, request_id: ConsultationId) -> Option<ConsultationRequest> {
        self.inner.read().requests.get(&request_id).cloned()
    }

    fn expired_open(&self) -> Vec<ConsultationId> {
        let inner = self.inner.read();
        inner
            .open_by_execution
            .values()
            .filter_map(|id| inner.requests.get(id))
            .filter(|req| req.is_expired())
            .map(|req| req.id)
            .collect()
    }

    fn list_open(&self) -> Vec<ConsultationRequest> {
        let inner = self.inner.read();
        inner
            .open_by_execution
            .values()
            .filter_map(|id| inner.requests.get(id))
            .cloned()
            .collect()
    }

    fn open_count(&self) -> usize {
        self.inner.read().open_by_execution.len()
    }

    fn remove_closed_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write();
        let before = inner.requests.len();
        inner
            .requests
            .retain(|_, req| match req.closed_at {
                Some(closed_at) => closed_at >= cutoff,
                None => true,
            });
        before - inner.requests.len()
    }
}
