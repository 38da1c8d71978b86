// Classifier client - turns an image attachment into a structured Verdict.
//
// The external classifier is a hosted text-generation service, not a typed
// API, so a malformed response is an expected failure mode. Parsing tries a
// strict JSON decode first (tolerating code fences) and falls back to a
// keyword scan biased toward flagging. Only transport failures, timeouts and
// non-success statuses surface as errors.
//
// NO HTTP dependencies here - the provider trait is implemented in infra.

use super::classifier_models::{
    Attachment, ClassifierConfig, ClassifierError, Verdict, VerdictSource, DEFAULT_CONFIDENCE,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

// ============================================================================
// PROVIDER TRAIT (PORT)
// ============================================================================

/// Port to the hosted completion endpoint.
///
/// Takes a data-URI-encoded image plus the config and returns the raw
/// completion text. One request, strict timeout, no retries - retry policy
/// belongs to the caller of the gate, not to this client.
#[async_trait]
pub trait ModerationProvider: Send + Sync {
    async fn moderate_image(
        &self,
        image_data_uri: &str,
        config: &ClassifierConfig,
    ) -> Result<String, ClassifierError>;
}

// Blanket implementation so the gate can hold a trait object when the
// provider is chosen at runtime.
#[async_trait]
impl ModerationProvider for Box<dyn ModerationProvider> {
    async fn moderate_image(
        &self,
        image_data_uri: &str,
        config: &ClassifierConfig,
    ) -> Result<String, ClassifierError> {
        (**self).moderate_image(image_data_uri, config).await
    }
}

// ============================================================================
// CLASSIFIER CLIENT
// ============================================================================

/// Classifies image attachments via the injected provider.
pub struct ClassifierClient<P: ModerationProvider> {
    provider: P,
    config: ClassifierConfig,
}

/// Strict shape of a well-behaved classifier response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredResponse {
    is_flagged: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: Option<f64>,
}

impl<P: ModerationProvider> ClassifierClient<P> {
    pub fn new(provider: P, config: ClassifierConfig) -> Self {
        Self { provider, config }
    }

    #[allow(dead_code)]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one attachment.
    ///
    /// Oversized attachments are rejected before the network call so an
    /// obviously-invalid input never wastes the external request.
    pub async fn classify(&self, attachment: &Attachment) -> Result<Verdict, ClassifierError> {
        if attachment.size() > self.config.max_attachment_bytes {
            return Err(ClassifierError::AttachmentTooLarge {
                size: attachment.size(),
                max: self.config.max_attachment_bytes,
            });
        }

        let data_uri = encode_data_uri(attachment);
        let content = self
            .provider
            .moderate_image(&data_uri, &self.config)
            .await?;

        let verdict = parse_verdict(&content);
        tracing::debug!(
            flagged = verdict.flagged,
            confidence = verdict.confidence,
            source = %verdict.source,
            "Classifier verdict"
        );
        Ok(verdict)
    }
}

/// Encode attachment bytes as `data:<mime>;base64,...` for transport.
fn encode_data_uri(attachment: &Attachment) -> String {
    format!(
        "data:{};base64,{}",
        attachment.mime_type,
        BASE64.encode(&attachment.bytes)
    )
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

/// Parse the raw completion text into a Verdict.
///
/// Strict decode first; on failure fall back to the heuristic scan. This
/// never fails - ambiguity degrades, it does not error.
pub fn parse_verdict(content: &str) -> Verdict {
    match parse_structured(content) {
        Some(verdict) => verdict,
        None => parse_heuristic(content),
    }
}

/// Attempt a strict JSON decode, tolerating markdown code fences around the
/// JSON body (models frequently wrap their output in ```json fences).
fn parse_structured(content: &str) -> Option<Verdict> {
    let candidate = extract_fenced(content).unwrap_or_else(|| content.trim());

    let parsed: StructuredResponse = serde_json::from_str(candidate).ok()?;
    Some(Verdict {
        flagged: parsed.is_flagged,
        reason: parsed.reason,
        confidence: clamp_confidence(parsed.confidence),
        source: VerdictSource::Structured,
    })
}

/// Pull the body out of the first ``` fenced block, skipping an optional
/// language tag on the opening fence.
fn extract_fenced(content: &str) -> Option<&str> {
    let start = content.find("```")?;
    let after_fence = &content[start + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Keywords that mark a response as flagged when strict decoding fails.
///
/// Biased toward flagging: a response that merely mentions one of these is
/// treated as unsafe rather than silently passed through.
const FLAG_KEYWORDS: &[&str] = &[
    "\"isflagged\": true",
    "\"isflagged\":true",
    "flagged: true",
    "inappropriate",
    "explicit",
    "nude",
    "nudity",
    "violence",
    "graphic content",
    "harassment",
];

/// Best-effort scan of free-form text for a flag decision and a confidence
/// token. Used when the response is not valid JSON.
fn parse_heuristic(content: &str) -> Verdict {
    let lowered = content.to_lowercase();
    let flagged = FLAG_KEYWORDS.iter().any(|kw| lowered.contains(kw));

    let reason = if flagged {
        "Content flagged by AI moderator".to_string()
    } else {
        "Content appears safe".to_string()
    };

    Verdict {
        flagged,
        reason,
        confidence: clamp_confidence(extract_confidence(&lowered)),
        source: VerdictSource::Heuristic,
    }
}

/// Extract the number following a `"confidence":` token, if any.
fn extract_confidence(lowered: &str) -> Option<f64> {
    let idx = lowered.find("\"confidence\":")?;
    let rest = lowered[idx + "\"confidence\":".len()..].trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

/// Clamp a confidence value into [0, 1]; missing or non-finite values fall
/// back to the default rather than being trusted.
fn clamp_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

// ============================================================================
// TESTS
// ============================================================================
