//! Structured audit logging for consultation lifecycles.
//!
//! Parley emits `tracing` events at every lifecycle edge, but dashboards
//! and tests also need a queryable in-process record of what happened to
//! a given execution. This module provides that:
//!
//! - **Correlation IDs**: every event can carry an execution ID and a
//!   consultation ID
//! - **Structured events**: typed fields for filtering and aggregation
//! - **Buffered collection**: thread-safe bounded ring buffer
//!
//! # Example
//!
//! ```
//! use parley_core::logging::{AuditCategory, AuditEvent, AuditSink, BufferedAuditLog};
//! use parley_core::types::ExecutionId;
//!
//! let log = BufferedAuditLog::with_default_capacity();
//! let execution_id = ExecutionId::new();
//!
//! log.record(
//!     AuditEvent::info(AuditCategory::Consultation, "Consultation opened")
//!         .with_execution_id(execution_id)
//!         .with_field("timeout_ms", "300000"),
//! );
//!
//! assert_eq!(log.by_execution(execution_id).len(), 1);
//! ```

mod collector;
mod event;

pub use collector::{AuditSink, BufferedAuditLog, DEFAULT_BUFFER_CAPACITY, NullAuditLog};
pub use event::{AuditCategory, AuditEvent, AuditLevel};
