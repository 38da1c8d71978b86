// Moderation gate - core business logic for the content-safety pipeline.
//
// This service handles:
// - Orchestrating classify -> decide -> act for one submitted attachment
// - Recording violations in the durable ledger
// - Escalation over a rolling violation window (warn -> notify authorities)
//
// NO HTTP or database dependencies here - just pure domain logic against
// the ledger and sink ports.

use super::moderation_models::{
    EnforcementDecision, EscalationNotice, LedgerError, ModerationConfig, NewViolation, SinkError,
    Violation, ViolationType,
};
use crate::core::classifier::{
    Attachment, ClassifierClient, ClassifierError, ModerationProvider,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Failure of the safety check itself.
///
/// An `Err` from the gate means the check could not be completed and the
/// caller must fail closed (do not deliver, ask the sender to retry). A
/// returned decision with `deliverable = false` means the content itself was
/// rejected - the two are deliberately distinguishable.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Classifier transport failure or timeout. An offline classifier is
    /// never interpreted as "content approved".
    #[error("Content classifier unavailable: {0}")]
    ClassifierUnavailable(ClassifierError),

    /// The block could not be durably recorded; never reported as success.
    #[error("Failed to record safety violation: {0}")]
    LedgerWrite(LedgerError),

    /// The violation window could not be read on the flagged path.
    #[error("Failed to read violation history: {0}")]
    LedgerRead(LedgerError),

    /// The submission was invalid before moderation even ran.
    #[error("Attachment rejected: {0}")]
    InvalidAttachment(String),

    /// The gate's pipeline task was torn down before reporting back
    /// (runtime shutdown or a panic inside the pipeline).
    #[error("Safety check did not complete: {0}")]
    TaskFailed(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Durable, queryable record of users' past violations.
///
/// Append-only: violations are never updated or deleted here. Reads must
/// hit the durable store at call time - caching a window count would open a
/// time-of-check/time-of-use gap under concurrent sends from one user.
#[async_trait]
pub trait ViolationLedger: Send + Sync {
    /// Durable insert. Returns the stored row with its assigned id.
    async fn append(&self, violation: NewViolation) -> Result<Violation, LedgerError>;

    /// Inclusive count of a user's violations at or after `since`.
    async fn count_since(&self, user_id: u64, since: DateTime<Utc>) -> Result<u64, LedgerError>;

    /// A user's violations, most-recent-first, bounded count. Full-history
    /// view for the safety dashboard.
    async fn recent_for_user(&self, user_id: u64, limit: u32)
        -> Result<Vec<Violation>, LedgerError>;
}

// ============================================================================
// ESCALATION SINK (PORT)
// ============================================================================

/// External notification sink for escalations (human-review queue,
/// authorities). Delivery failure must not roll back the recorded violation
/// or the block decision; the gate only logs it.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), SinkError>;
}

// Blanket implementation so the composition root can pick a sink at runtime.
#[async_trait]
impl EscalationSink for Box<dyn EscalationSink> {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), SinkError> {
        (**self).notify(notice).await
    }
}

// ============================================================================
// ESCALATION POLICY
// ============================================================================

/// Stateless escalation decision over the rolling window.
///
/// `count >= threshold` escalates; no hysteresis, no decay. The window is
/// sliding (`occurred_at >= now - window`), not calendar-bucketed, so the
/// count cannot be reset by waiting for midnight.
pub fn should_escalate(count_in_window: u64, threshold: u32) -> bool {
    count_in_window >= threshold as u64
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The moderation gate: every outbound image attachment passes through
/// `evaluate` before the messaging path may deliver it.
///
/// Stateless across invocations except via the ledger - escalation is
/// always derived from durable history re-read at decision time, never from
/// an in-memory counter that could desync across concurrent requests.
pub struct ModerationGate<P: ModerationProvider, L: ViolationLedger, N: EscalationSink> {
    classifier: Arc<ClassifierClient<P>>,
    ledger: Arc<L>,
    sink: Arc<N>,
    config: ModerationConfig,
}

impl<P, L, N> ModerationGate<P, L, N>
where
    P: ModerationProvider + 'static,
    L: ViolationLedger + 'static,
    N: EscalationSink + 'static,
{
    pub fn new(
        classifier: ClassifierClient<P>,
        ledger: L,
        sink: N,
        config: ModerationConfig,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            ledger: Arc::new(ledger),
            sink: Arc::new(sink),
            config,
        }
    }

    /// Attachment submission boundary.
    ///
    /// Validates size/type before the gate proper runs, then evaluates.
    pub async fn submit_attachment(
        &self,
        user_id: u64,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<EnforcementDecision, ModerationError> {
        if bytes.is_empty() {
            return Err(ModerationError::InvalidAttachment(
                "Attachment is empty".to_string(),
            ));
        }
        if !mime_type.starts_with("image/") {
            return Err(ModerationError::InvalidAttachment(format!(
                "Unsupported attachment type: {}",
                mime_type
            )));
        }

        let attachment = Attachment::new(bytes, mime_type);
        self.evaluate(user_id, &attachment).await
    }

    /// Evaluate one attachment for one user.
    ///
    /// The pipeline runs on its own task and this future only awaits its
    /// handle: a sender who disconnects while the classifier is still
    /// thinking drops the await, not the task, so the classification
    /// completes and the violation write still lands. The discarded result
    /// simply goes unread.
    pub async fn evaluate(
        &self,
        user_id: u64,
        attachment: &Attachment,
    ) -> Result<EnforcementDecision, ModerationError> {
        let pipeline = tokio::spawn(run_pipeline(
            Arc::clone(&self.classifier),
            Arc::clone(&self.ledger),
            Arc::clone(&self.sink),
            self.config.clone(),
            user_id,
            attachment.clone(),
        ));

        pipeline
            .await
            .map_err(|e| ModerationError::TaskFailed(e.to_string()))?
    }

    /// A user's violation history, most-recent-first (safety dashboard).
    pub async fn violation_history(
        &self,
        user_id: u64,
        limit: u32,
    ) -> Result<Vec<Violation>, ModerationError> {
        self.ledger
            .recent_for_user(user_id, limit)
            .await
            .map_err(ModerationError::LedgerRead)
    }

    /// The current gate configuration.
    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }
}

/// Classify -> record -> count -> notify for one attachment.
///
/// Side effects are strictly ordered: the violation write happens before
/// the escalation check, so the just-recorded violation counts itself in
/// the window - a third strike escalates on the call that lands it.
async fn run_pipeline<P, L, N>(
    classifier: Arc<ClassifierClient<P>>,
    ledger: Arc<L>,
    sink: Arc<N>,
    config: ModerationConfig,
    user_id: u64,
    attachment: Attachment,
) -> Result<EnforcementDecision, ModerationError>
where
    P: ModerationProvider,
    L: ViolationLedger,
    N: EscalationSink,
{
    let verdict = classifier.classify(&attachment).await.map_err(|e| match e {
        // An oversized attachment is a caller problem, not an outage.
        ClassifierError::AttachmentTooLarge { size, max } => {
            ModerationError::InvalidAttachment(format!(
                "Attachment of {} bytes exceeds the {} byte limit",
                size, max
            ))
        }
        other => ModerationError::ClassifierUnavailable(other),
    })?;

    if !verdict.flagged {
        tracing::info!(user_id, confidence = verdict.confidence, "Attachment clean");
        return Ok(EnforcementDecision::clean());
    }

    let now = Utc::now();
    let violation = ledger
        .append(NewViolation {
            user_id,
            violation_type: ViolationType::InappropriateImage,
            details: serde_json::json!({
                "reason": verdict.reason,
                "confidence": verdict.confidence,
                "verdict_source": verdict.source,
            }),
            occurred_at: now,
        })
        .await
        .map_err(ModerationError::LedgerWrite)?;

    let window_start = now - config.window();
    let count = ledger
        .count_since(user_id, window_start)
        .await
        .map_err(ModerationError::LedgerRead)?;

    let escalate = should_escalate(count, config.escalation_threshold);

    tracing::warn!(
        user_id,
        violation_id = violation.id,
        count_in_window = count,
        escalate,
        "Attachment blocked"
    );

    // One-shot notification on the write that carried the window across the
    // threshold: this call's append contributed exactly one violation, so
    // the window held `count - 1` before it. Later strikes keep
    // escalate = true in the decision but do not re-notify for the same
    // crossing. Concurrent crossings race on the count they observe; at
    // most one sees the exact crossing.
    let crossed = escalate && !should_escalate(count.saturating_sub(1), config.escalation_threshold);
    if crossed {
        let notice = EscalationNotice {
            user_id,
            violation_count: count,
            window_start,
            window_end: now,
        };
        if let Err(e) = sink.notify(&notice).await {
            tracing::warn!(user_id, "Escalation notice delivery failed: {}", e);
        }
    }

    let block_reason = if verdict.reason.trim().is_empty() {
        config.default_block_reason.clone()
    } else {
        verdict.reason
    };

    Ok(EnforcementDecision::blocked(block_reason, escalate))
}

// ============================================================================
// TESTS
// ============================================================================
