//! Anthropic Messages API provider (`claude`)

use crate::config::LlmConfig;
use crate::errors::{AlfredError, Result};
use crate::models::provider::{build_http_client, check_status, ModelProvider};
use crate::models::types::{AnthropicResponse, CompletionSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    settings: CompletionSettings,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AlfredError::provider("claude", "API key is empty"));
        }
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            base_url: config.anthropic_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.anthropic_model.clone(),
            settings: CompletionSettings {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

/// Concatenate the text blocks of a Messages API reply
pub fn parse_anthropic_response(response: AnthropicResponse) -> Result<String> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(AlfredError::provider("claude", "response contained no text"));
    }
    Ok(text)
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(url = %url, model = %self.model, provider = "claude", "sending LLM request");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let response = check_status("claude", response).await?;

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AlfredError::provider("claude", format!("malformed response: {}", e)))?;
        parse_anthropic_response(parsed)
    }
}
