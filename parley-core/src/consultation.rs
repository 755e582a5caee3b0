//! Consultation request, resolution and outcome types.
//!
//! A consultation is one pause-for-human-input episode tied to one
//! execution. The prompt payload is an opaque capsule the core passes
//! through to the reviewer without interpreting it.

use crate::types::{ConsultationId, ExecutionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The human's verdict on a consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "payload")]
pub enum Verdict {
    /// The reviewer approved the proposed action.
    Approved,
    /// The reviewer rejected it.
    Rejected,
    /// The reviewer approved a modified version; the payload replaces the
    /// agent's proposal and is passed through uninterpreted.
    Modified(serde_json::Value),
}

/// Outcome supplied by a human reviewer. Immutable once attached to a
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The decision.
    pub verdict: Verdict,
    /// Identity of the reviewer, opaque to the core.
    pub resolver: String,
    /// When the decision was made.
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    /// Create an approval resolution.
    pub fn approved(resolver: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Approved,
            resolver: resolver.into(),
            resolved_at: Utc::now(),
        }
    }

    /// Create a rejection resolution.
    pub fn rejected(resolver: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            resolver: resolver.into(),
            resolved_at: Utc::now(),
        }
    }

    /// Create a modification resolution carrying a replacement payload.
    pub fn modified(resolver: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            verdict: Verdict::Modified(payload),
            resolver: resolver.into(),
            resolved_at: Utc::now(),
        }
    }
}

/// Why a consultation request was closed.
///
/// Exactly one of these is attached to a request, exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum CloseReason {
    /// A human resolution arrived before the deadline.
    Resolved(Resolution),
    /// The deadline elapsed unanswered.
    Expired,
    /// The owning execution was cancelled or failed.
    Cancelled,
}

/// One pending (or recently closed) ask-a-human event.
///
/// An execution has at most one request with `closed == None` at a time.
/// Closed requests are retained briefly for inspection and idempotency
/// and are garbage-collected by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationRequest {
    /// Unique ID reviewers address their resolution to.
    pub id: ConsultationId,
    /// The execution that is paused on this request.
    pub execution_id: ExecutionId,
    /// Opaque prompt payload for the reviewer UI; never inspected here.
    pub prompt: serde_json::Value,
    /// When the request was opened.
    pub created_at: DateTime<Utc>,
    /// When the request expires unanswered (`created_at` + timeout).
    pub deadline: DateTime<Utc>,
    /// Close state; `None` while the request is open.
    pub closed: Option<CloseReason>,
    /// When the request was closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl ConsultationRequest {
    /// Create a new open request with a deadline `timeout` from now.
    pub fn new(execution_id: ExecutionId, prompt: serde_json::Value, timeout: Duration) -> Self {
        let created_at = Utc::now();
        // Out-of-range timeouts saturate to "never".
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: ConsultationId::new(),
            execution_id,
            prompt,
            created_at,
            deadline,
            closed: None,
            closed_at: None,
        }
    }

    /// Whether the request is still awaiting closure.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    /// Whether the request is open and past its deadline.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_open() && Utc::now() >= self.deadline
    }

    /// Time until the deadline (`None` if closed or already past it).
    #[must_use]
    pub fn time_until_deadline(&self) -> Option<Duration> {
        if !self.is_open() {
            return None;
        }
        (self.deadline - Utc::now()).to_std().ok()
    }
}

/// What a suspended `request_human_input` call returns.
///
/// Cancellation is not an outcome: it surfaces as
/// [`ParleyError::Cancelled`](crate::error::ParleyError::Cancelled)
/// because the execution is terminal afterwards, whereas both variants
/// here leave it RUNNING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationOutcome {
    /// A human decision arrived in time.
    Resolved(Resolution),
    /// The deadline elapsed; the synthetic timeout outcome.
    TimedOut,
}

impl ConsultationOutcome {
    /// The resolution, if a human answered.
    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            Self::Resolved(res) => Some(res),
            Self::TimedOut => None,
        }
    }

    /// Whether the consultation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}
