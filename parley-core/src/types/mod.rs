//! Strongly-typed identifiers for Parley entities.

mod ids;

pub use ids::{AgentId, ConsultationId, ExecutionId};
