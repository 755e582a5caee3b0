//! Audit event types for consultation lifecycle logging.
//!
//! Provides structured events with correlation IDs (execution ID,
//! consultation ID) for inspection of pause/resume histories.

use crate::types::{ConsultationId, ExecutionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Audit severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum AuditLevel {
    /// Debugging information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl AuditLevel {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Execution lifecycle events (register, transition, complete, fail).
    Execution,
    /// Consultation events (open, resolve, cancel).
    Consultation,
    /// Supervisor events (expiry sweeps, garbage collection).
    Supervisor,
    /// System/internal events.
    System,
}

impl AuditCategory {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Consultation => "consultation",
            Self::Supervisor => "supervisor",
            Self::System => "system",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured audit event with correlation IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID, assigned by the collector.
    pub id: u64,
    /// Timestamp in nanoseconds since UNIX epoch.
    pub timestamp_ns: u64,
    /// Severity level.
    pub level: AuditLevel,
    /// Event category.
    pub category: AuditCategory,
    /// Associated execution (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Associated consultation request (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<ConsultationId>,
    /// Human-readable message.
    pub message: String,
    /// Structured fields for additional context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
}

impl AuditEvent {
    /// Create a new event with the current timestamp.
    pub fn new(level: AuditLevel, category: AuditCategory, message: impl Into<String>) -> Self {
        Self {
            id: 0, // assigned by the collector
            timestamp_ns: current_timestamp_ns(),
            level,
            category,
            execution_id: None,
            request_id: None,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// Create a debug-level event.
    pub fn debug(category: AuditCategory, message: impl Into<String>) -> Self {
        Self::new(AuditLevel::Debug, category, message)
    }

    /// Create an info-level event.
    pub fn info(category: AuditCategory, message: impl Into<String>) -> Self {
        Self::new(AuditLevel::Info, category, message)
    }

    /// Create a warn-level event.
    pub fn warn(category: AuditCategory, message: impl Into<String>) -> Self {
        Self::new(AuditLevel::Warn, category, message)
    }

    /// Create an error-level event.
    pub fn error(category: AuditCategory, message: impl Into<String>) -> Self {
        Self::new(AuditLevel::Error, category, message)
    }

    /// Set the execution ID.
    pub fn with_execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    /// Set the consultation request ID.
    pub fn with_request_id(mut self, request_id: ConsultationId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add a string field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.category, self.message)?;
        if let Some(execution_id) = self.execution_id {
            write!(f, " ({execution_id})")?;
        }
        Ok(())
    }
}

fn current_timestamp_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder() {
        let execution_id = ExecutionId::new();
        let event = AuditEvent::info(AuditCategory::Consultation, "opened")
            .with_execution_id(execution_id)
            .with_field("timeout_ms", "100");

        assert_eq!(event.level, AuditLevel::Info);
        assert_eq!(event.execution_id, Some(execution_id));
        assert_eq!(event.fields.get("timeout_ms").unwrap(), "100");
    }

    #[test]
    fn level_ordering() {
        assert!(AuditLevel::Debug < AuditLevel::Info);
        assert!(AuditLevel::Warn < AuditLevel::Error);
    }

    #[test]
    fn event_display() {
        let event = AuditEvent::warn(AuditCategory::Supervisor, "expired");
        let msg = format!("{}", event);
        assert!(msg.contains("warn"));
        assert!(msg.contains("supervisor"));
        assert!(msg.contains("expired"));
    }
}
