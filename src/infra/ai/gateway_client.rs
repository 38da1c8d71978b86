// AI gateway client - hosted completion endpoint integration.
//
// Implements the `ModerationProvider` trait against an OpenAI-compatible
// chat-completions gateway. The request carries the moderation system
// instruction plus a user message with the data-URI-encoded image; the
// response body is returned as raw text for the core parser to deal with.
//
// The classifier is an untrusted, possibly-unavailable oracle: this client
// reports transport failures, timeouts and non-success statuses as
// `ClassifierError` and does nothing else - no retries, no parsing.

use crate::core::classifier::{ClassifierConfig, ClassifierError, ModerationProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub struct AiGatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AiGatewayClient {
    /// Create a client with the timeout baked into the underlying HTTP
    /// client, so every classification request gets the same hard bound.
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

/// Build the chat-completions request body for one image.
fn build_request_body(image_data_uri: &str, config: &ClassifierConfig) -> serde_json::Value {
    json!({
        "model": config.model,
        "messages": [
            {
                "role": "system",
                "content": config.system_prompt,
            },
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": "Analyze this image for inappropriate content:",
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": image_data_uri },
                    },
                ],
            },
        ],
        "max_tokens": config.max_tokens,
    })
}

/// Pull the completion text out of the gateway response.
fn extract_content(response: &serde_json::Value) -> Result<String, ClassifierError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or(ClassifierError::EmptyResponse)
}

fn map_transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Transport(e.to_string())
    }
}

#[async_trait]
impl ModerationProvider for AiGatewayClient {
    async fn moderate_image(
        &self,
        image_data_uri: &str,
        config: &ClassifierConfig,
    ) -> Result<String, ClassifierError> {
        let payload = build_request_body(image_data_uri, config);

        tracing::debug!(model = %config.model, "Sending moderation request to AI gateway");

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status { code, body });
        }

        let response_json: serde_json::Value =
            response.json().await.map_err(map_transport_error)?;

        extract_content(&response_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let config = ClassifierConfig::default();
        let body = build_request_body("data:image/png;base64,AAAA", &config);

        assert_eq!(body["model"], "google/gemini-2.5-flash");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_extract_content() {
        let response = json!({
            "choices": [{ "message": { "content": "{\"isFlagged\": false}" } }]
        });

        assert_eq!(
            extract_content(&response).unwrap(),
            "{\"isFlagged\": false}"
        );
    }

    #[test]
    fn test_missing_content_is_empty_response() {
        let response = json!({ "choices": [] });

        assert!(matches!(
            extract_content(&response),
            Err(ClassifierError::EmptyResponse)
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = AiGatewayClient::new(
            "https://gateway.example.com/",
            "key".to_string(),
            Duration::from_secs(10),
        )
        .unwrap();

        assert_eq!(
            client.completions_url(),
            "https://gateway.example.com/v1/chat/completions"
        );
    }
}
