//! Audit log collectors.
//!
//! Provides a thread-safe collector that accumulates audit events in a
//! bounded ring buffer with automatic ID assignment.

use super::event::AuditEvent;
use crate::types::{ConsultationId, ExecutionId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of events kept by the default buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Trait for audit event sinks.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);

    /// Get the number of recorded events.
    fn len(&self) -> usize;

    /// Check if the sink is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe audit log with a bounded ring buffer.
///
/// Oldest events are evicted first once the capacity is reached.
pub struct BufferedAuditLog {
    buffer: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl BufferedAuditLog {
    /// Create a new log with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a log with default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }

    /// Get the most recent N events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let buffer = self.buffer.read();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Get events for a specific execution, oldest first.
    pub fn by_execution(&self, execution_id: ExecutionId) -> Vec<AuditEvent> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|e| e.execution_id == Some(execution_id))
            .cloned()
            .collect()
    }

    /// Get events for a specific consultation request, oldest first.
    pub fn by_request(&self, request_id: ConsultationId) -> Vec<AuditEvent> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|e| e.request_id == Some(request_id))
            .cloned()
            .collect()
    }

    /// Drop all recorded events.
    pub fn clear(&self) {
        self.buffer.write().clear();
    }
}

impl Default for BufferedAuditLog {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl AuditSink for BufferedAuditLog {
    fn record(&self, mut event: AuditEvent) {
        event.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    fn len(&self) -> usize {
        self.buffer.read().len()
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

impl AuditSink for NullAuditLog {
    fn record(&self, _event: AuditEvent) {}

    fn len(&self) -> usize {
        0
    }
}
