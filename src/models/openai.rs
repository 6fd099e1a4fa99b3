//! OpenAI Chat Completions provider (`openai`, alias `gpt4`)

use crate::config::LlmConfig;
use crate::errors::{AlfredError, Result};
use crate::models::provider::{build_http_client, check_status, ModelProvider};
use crate::models::types::{ChatCompletionResponse, CompletionSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct OpenAiProvider {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    settings: CompletionSettings,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AlfredError::provider("openai", "API key is empty"));
        }
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            base_url: config.openai_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.openai_model.clone(),
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

/// First choice's message content
pub fn parse_openai_response(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AlfredError::provider("openai", "response contained no choices"))
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %self.model, provider = "openai", "sending LLM request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let response = check_status("openai", response).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AlfredError::provider("openai", format!("malformed response: {}", e)))?;
        parse_openai_response(parsed)
    }
}
