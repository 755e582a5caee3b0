//! Parley Core Library
//!
//! This crate provides the foundational types for the Parley
//! human-in-the-loop (HITL) coordination engine.
//!
//! # Overview
//!
//! Parley coordinates the pause/resume lifecycle of autonomous agent
//! executions that need a human decision mid-task. This crate holds the
//! pieces with no runtime dependencies:
//!
//! - **Types**: Strongly-typed identifiers for executions, consultations
//!   and agents
//! - **State**: The per-execution state machine and its transition table
//! - **Consultation**: Request, resolution and outcome types
//! - **Error**: Typed error taxonomy with stable error codes
//! - **Logging**: Structured audit events for lifecycle inspection
//!
//! The runtime (state registry, consultation store, timeout supervisor and
//! the suspending coordination calls) lives in `parley-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consultation;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod state;
pub mod types;

// Re-export key types at crate root for convenience
pub use consultation::{CloseReason, ConsultationOutcome, ConsultationRequest, Resolution, Verdict};
pub use error::{ParleyError, Result};
pub use state::{ExecutionEvent, ExecutionState};
pub use types::{AgentId, ConsultationId, ExecutionId};
