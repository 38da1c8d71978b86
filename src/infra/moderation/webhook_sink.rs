// Escalation sink implementations.
//
// `WebhookEscalationSink` POSTs the notice to an external human-review /
// authorities queue. `NullEscalationSink` only logs, for local runs where
// no queue is configured. Either way, delivery failure never propagates
// past the gate's warning log.

use crate::core::moderation::{EscalationNotice, EscalationSink, SinkError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub struct WebhookEscalationSink {
    client: Client,
    url: String,
}

impl WebhookEscalationSink {
    pub fn new(url: String, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl EscalationSink for WebhookEscalationSink {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| SinkError::DeliveryError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SinkError::DeliveryError(format!(
                "Escalation webhook returned {}",
                response.status()
            )));
        }

        tracing::info!(
            user_id = notice.user_id,
            violation_count = notice.violation_count,
            "Escalation notice delivered"
        );
        Ok(())
    }
}

/// Sink that records escalations in the log only.
pub struct NullEscalationSink;

#[async_trait]
impl EscalationSink for NullEscalationSink {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), SinkError> {
        tracing::warn!(
            user_id = notice.user_id,
            violation_count = notice.violation_count,
            window_start = %notice.window_start,
            window_end = %notice.window_end,
            "Escalation triggered (no sink configured)"
        );
        Ok(())
    }
}
