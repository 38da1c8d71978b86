// Classifier domain models - types for the image content classifier.
//
// These are pure domain types with no HTTP or provider dependencies.
// The infra layer converts these to whatever the hosted AI endpoint expects.

use serde::Serialize;
use thiserror::Error;

/// Confidence used when the classifier response carries no usable number.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// System instruction sent with every classification request.
///
/// Kept as a constant so the request is identical for every attachment;
/// the response contract (the JSON shape) is what the parser expects.
pub const MODERATION_SYSTEM_PROMPT: &str = r#"You are a content moderation AI for a women's safety platform. Analyze images for:
1. Nudity or sexually explicit content
2. Violence or graphic content
3. Harassment or threatening imagery
4. Any content that could be used for abuse

Respond in JSON format:
{
  "isFlagged": boolean,
  "reason": "brief explanation if flagged",
  "confidence": number (0-1)
}

Be strict but fair. Prioritize safety."#;

// ============================================================================
// ERRORS
// ============================================================================

/// Failures of the classification call itself.
///
/// Parse ambiguity is deliberately NOT represented here - a response we
/// cannot decode strictly degrades to a heuristic `Verdict` instead of
/// failing the pipeline.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Transport error calling classifier: {0}")]
    Transport(String),

    #[error("Classifier request timed out")]
    Timeout,

    #[error("Classifier endpoint returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Attachment of {size} bytes exceeds the {max} byte limit")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("Classifier response contained no completion text")]
    EmptyResponse,
}

// ============================================================================
// DOMAIN TYPES
// ============================================================================

/// Raw binary content submitted for one send attempt.
///
/// Ephemeral and owned by the caller; never persisted unless it clears
/// moderation.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// How a verdict was obtained from the raw classifier response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictSource {
    /// Strict JSON decode of the response body succeeded.
    Structured,
    /// Fell back to keyword scanning of the free-form text.
    Heuristic,
}

impl std::fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictSource::Structured => write!(f, "structured"),
            VerdictSource::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Result of classifying one attachment.
///
/// Produced fresh per request and never mutated. `confidence` is always
/// within [0, 1] - out-of-range or missing values from the external
/// classifier are clamped/defaulted, never trusted blindly.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub flagged: bool,
    pub reason: String,
    pub confidence: f64,
    pub source: VerdictSource,
}

/// Configuration for the classifier client.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Model identifier passed to the completion endpoint.
    pub model: String,
    /// Attachments above this size are rejected before the network call.
    pub max_attachment_bytes: usize,
    /// Hard timeout for the single classification request (seconds).
    pub request_timeout_secs: u64,
    /// Token budget for the completion.
    pub max_tokens: u32,
    /// System instruction sent with every request.
    pub system_prompt: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-2.5-flash".to_string(),
            max_attachment_bytes: 10 * 1024 * 1024, // 10 MiB
            request_timeout_secs: 10,
            max_tokens: 300,
            system_prompt: MODERATION_SYSTEM_PROMPT.to_string(),
        }
    }
}
