//! Provider abstraction over hosted and local LLMs

use crate::errors::{AlfredError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Single-prompt completion backend
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Canonical provider name (`claude`, `openai`, `ollama`)
    fn name(&self) -> &str;

    /// Send one user prompt and return the reply text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the shared HTTP client with a request timeout
pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(AlfredError::from)
}

/// Turn a non-2xx response into a provider error carrying the body
pub async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AlfredError::provider(
        provider,
        format!("API error {}: {}", status, body.trim()),
    ))
}
