//! Local Ollama provider (`ollama`)
//!
//! Calls POST /api/generate with streaming disabled.

use crate::config::LlmConfig;
use crate::errors::{AlfredError, Result};
use crate::models::provider::{build_http_client, check_status, ModelProvider};
use crate::models::types::{CompletionSettings, GenerateResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub struct OllamaProvider {
    http: Client,
    base_url: String,
    model: String,
    settings: CompletionSettings,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config.request_timeout_secs)?,
            base_url: config.ollama.url.trim_end_matches('/').to_string(),
            model: config.ollama.model.clone(),
            settings: CompletionSettings {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.settings.temperature,
                "num_predict": self.settings.max_tokens,
            },
        })
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!(url = %url, model = %self.model, provider = "ollama", "sending LLM request");

        let response = self
            .http
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| AlfredError::provider("ollama", format!("failed to connect: {}", e)))?;
        let response = check_status("ollama", response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AlfredError::provider("ollama", format!("malformed response: {}", e)))?;
        Ok(parsed.response)
    }
}
