// Test-moderation CLI and composition root.
//
// Runs one image file through the full moderation gate against the real
// SQLite ledger and the real AI gateway, then prints the enforcement
// decision. Handy for verifying the pipeline (and the three-strikes
// escalation) without wiring up a messaging frontend.
//
// This file's job is to:
// 1. Load configuration from the environment
// 2. Initialize services (dependency injection)
// 3. Submit the attachment and report the decision

use anyhow::{bail, Context};
use message_guard::core::classifier::{ClassifierClient, ClassifierConfig};
use message_guard::core::moderation::{EscalationSink, ModerationConfig, ModerationGate};
use message_guard::infra::ai::AiGatewayClient;
use message_guard::infra::moderation::{
    NullEscalationSink, SqliteViolationStore, WebhookEscalationSink,
};
use std::time::Duration;

const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev";

fn mime_for(path: &str) -> Option<&'static str> {
    let name = path.to_lowercase();
    if name.ends_with(".png") {
        Some("image/png")
    } else if name.ends_with(".jpg") || name.ends_with(".jpeg") {
        Some("image/jpeg")
    } else if name.ends_with(".gif") {
        Some("image/gif")
    } else if name.ends_with(".webp") {
        Some("image/webp")
    } else {
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        bail!("Usage: {} <user_id> <image_path>", args[0]);
    }
    let user_id: u64 = args[1].parse().context("user_id must be a number")?;
    let image_path = &args[2];

    let mime_type = mime_for(image_path)
        .with_context(|| format!("Unsupported image extension: {}", image_path))?;
    let bytes = std::fs::read(image_path)
        .with_context(|| format!("Failed to read image file {}", image_path))?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let api_key = std::env::var("AI_GATEWAY_API_KEY")
        .context("Missing AI_GATEWAY_API_KEY environment variable")?;
    let gateway_url =
        std::env::var("AI_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());

    let mut classifier_config = ClassifierConfig::default();
    if let Ok(model) = std::env::var("MODERATION_MODEL") {
        classifier_config.model = model;
    }

    let provider = AiGatewayClient::new(
        gateway_url,
        api_key,
        Duration::from_secs(classifier_config.request_timeout_secs),
    )?;
    let classifier = ClassifierClient::new(provider, classifier_config);

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let db_path =
        std::env::var("MODERATION_DB_PATH").unwrap_or_else(|_| "data/moderation.db".to_string());
    let ledger = SqliteViolationStore::new(&db_path)
        .await
        .context("Failed to initialize SQLite violation store")?;

    let sink: Box<dyn EscalationSink> = match std::env::var("ESCALATION_WEBHOOK_URL") {
        Ok(url) => Box::new(WebhookEscalationSink::new(url, Duration::from_secs(10))?),
        Err(_) => Box::new(NullEscalationSink),
    };

    let gate = ModerationGate::new(classifier, ledger, sink, ModerationConfig::default());

    // ========================================================================
    // RUN THE GATE
    // ========================================================================

    match gate.submit_attachment(user_id, bytes, mime_type).await {
        Ok(decision) if decision.deliverable => {
            println!("APPROVED: content appears safe, deliverable");
        }
        Ok(decision) => {
            println!("BLOCKED: {}", decision.block_reason);
            if decision.escalate {
                println!("ESCALATED: repeated violations inside the rolling window");
            }
        }
        Err(e) => {
            // Safety check failed - fail closed, the caller should retry.
            println!("SAFETY CHECK FAILED (content not delivered): {}", e);
        }
    }

    let history = gate.violation_history(user_id, 10).await?;
    if !history.is_empty() {
        println!("\nRecent violations for user {}:", user_id);
        for violation in history {
            println!(
                "  #{} {} at {} ({})",
                violation.id,
                violation.violation_type,
                violation.occurred_at.to_rfc3339(),
                violation.details["reason"].as_str().unwrap_or("-")
            );
        }
    }

    Ok(())
}
