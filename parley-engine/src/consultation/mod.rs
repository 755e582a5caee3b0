//! Consultation request registry and timeout supervision.

mod store;
mod supervisor;

pub use store::{ConsultationStore, MemoryConsultationStore};
pub use supervisor::{SweepEvent, TimeoutSupervisor};
