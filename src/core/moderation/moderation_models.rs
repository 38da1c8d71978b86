// Moderation domain models - data structures for the content-safety gate.
//
// These are pure domain types with no storage or HTTP dependencies.
// The infra layer converts these to database rows and wire payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Failures of the violation ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Failure delivering an escalation notice to the external sink.
///
/// Never rolls back the recorded violation or the block decision.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Escalation sink error: {0}")]
    DeliveryError(String),
}

// ============================================================================
// DOMAIN TYPES
// ============================================================================

/// Category of a recorded safety violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// An image attachment was flagged by the classifier.
    InappropriateImage,
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationType::InappropriateImage => write!(f, "inappropriate_image"),
        }
    }
}

impl std::str::FromStr for ViolationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inappropriate_image" => Ok(ViolationType::InappropriateImage),
            other => Err(format!("Unknown violation type: {}", other)),
        }
    }
}

/// A durable record of one flagged attachment.
///
/// Created exactly once per flagged attachment, immediately after the block
/// decision. Immutable once written - this subsystem never updates or
/// deletes violations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: i64,
    pub user_id: u64,
    pub violation_type: ViolationType,
    /// Opaque structured payload (verdict reason, confidence, parse source).
    pub details: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// A violation about to be written; the ledger assigns the id.
#[derive(Debug, Clone)]
pub struct NewViolation {
    pub user_id: u64,
    pub violation_type: ViolationType,
    pub details: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// The single output of one gate invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnforcementDecision {
    /// Whether the messaging path may persist and deliver the attachment.
    pub deliverable: bool,
    /// User-facing rejection message when not deliverable.
    pub block_reason: String,
    /// Whether the violation window is at or above the escalation threshold.
    pub escalate: bool,
}

impl EnforcementDecision {
    /// Decision for content that passed moderation.
    pub fn clean() -> Self {
        Self {
            deliverable: true,
            block_reason: String::new(),
            escalate: false,
        }
    }

    /// Decision for blocked content.
    pub fn blocked(block_reason: String, escalate: bool) -> Self {
        Self {
            deliverable: false,
            block_reason,
            escalate,
        }
    }
}

/// Payload delivered to the escalation notification sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub user_id: u64,
    pub violation_count: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Configuration for the moderation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Violations within the window at which escalation triggers.
    pub escalation_threshold: u32,
    /// Rolling window length in hours (sliding, not calendar-bucketed).
    pub window_hours: i64,
    /// Rejection message used when the verdict carries no reason.
    pub default_block_reason: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 3, // 3 strikes...
            window_hours: 24,        // ...in any 24-hour span
            default_block_reason:
                "This image contains inappropriate content and cannot be shared.".to_string(),
        }
    }
}

impl ModerationConfig {
    /// The rolling window as a chrono duration.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours)
    }
}
