//! Prelude for convenient imports.
//!
//! ```
//! use parley_core::prelude::*;
//!
//! let state = ExecutionState::Running;
//! assert!(state.apply(&ExecutionEvent::Complete).unwrap().is_terminal());
//! ```

pub use crate::consultation::{
    CloseReason, ConsultationOutcome, ConsultationRequest, Resolution, Verdict,
};
pub use crate::error::{ParleyError, Result};
pub use crate::logging::{AuditCategory, AuditEvent, AuditLevel, AuditSink, BufferedAuditLog};
pub use crate::state::{ExecutionEvent, ExecutionState};
pub use crate::types::{AgentId, ConsultationId, ExecutionId};
