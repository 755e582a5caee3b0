//! Parley Engine - Human-in-the-loop coordination runtime.
//!
//! This crate provides the runtime for suspending autonomous agent
//! executions on a human decision and resuming them exactly once:
//!
//! - Per-execution state machine registry with optimistic versioning
//! - In-memory consultation store with exact-once closure
//! - Suspending `request_human_input` call (oneshot wake + deadline)
//! - Timeout supervisor for expiry sweeps and garbage collection
//!
//! # Example
//!
//! ```no_run
//! use parley_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> parley_core::Result<()> {
//! let manager = Arc::new(ConsultationManager::new(EngineConfig::default()));
//! let execution = manager.begin(AgentId::new());
//!
//! // Agent task side: suspend until a human decides (or the deadline hits).
//! let outcome = manager
//!     .request_human_input(
//!         execution.id,
//!         serde_json::json!({"action": "delete production table"}),
//!         None,
//!     )
//!     .await?;
//!
//! // Reviewer side (e.g. an HTTP handler), for some pending request:
//! // manager.submit_resolution(request_id, Resolution::approved("alice"))?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consultation;
pub mod manager;
pub mod state;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::consultation::{
        ConsultationStore, MemoryConsultationStore, SweepEvent, TimeoutSupervisor,
    };
    pub use crate::manager::ConsultationManager;
    pub use crate::state::{AgentStateManager, ExecutionSnapshot};
    pub use parley_core::prelude::*;
}
