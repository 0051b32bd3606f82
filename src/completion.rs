//! Text-completion provider abstraction and implementations.
//!
//! Defines the [`CompletionClient`] trait and concrete implementations:
//! - **[`DisabledClient`]** — returns errors; used when no provider is configured.
//! - **[`OpenAiClient`]** — calls any OpenAI-compatible chat-completions
//!   endpoint (the `base_url` in `[completion]` selects the gateway) with
//!   retry and exponential backoff.
//!
//! The analyzers hold the client as an `Arc<dyn CompletionClient>` so tests
//! can inject scripted or failing clients.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::CompletionConfig;

/// A text-completion capability: one prompt in, one text response out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the model identifier every request is issued with.
    fn model_name(&self) -> &str;

    /// Send a single user prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============ Disabled Client ============

/// A no-op completion client that always returns errors.
///
/// Used when `completion.provider = "disabled"` in the configuration. The
/// analyzers degrade to their placeholder results when they hit it.
pub struct DisabledClient;

#[async_trait]
impl CompletionClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenAI-compatible Client ============

/// Completion client for OpenAI-compatible chat endpoints.
///
/// Calls `POST {base_url}/chat/completions` with the configured model.
/// Reads the API key from the `OPENAI_API_KEY` environment variable;
/// gateways that need no key accept the request without one.
pub struct OpenAiClient {
    model: String,
    base_url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = format!("{}/chat/completions", self.base_url);
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(model = %self.model, attempt, "sending completion request");

            let mut request = client.post(&url).header("Content-Type", "application/json");
            if !api_key.is_empty() {
                request = request.header("Authorization", format!("Bearer {}", api_key));
            }

            let resp = request.json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Completion API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Completion API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

/// Parse the chat-completions response JSON.
///
/// Extracts `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))
}

/// Create the appropriate [`CompletionClient`] based on configuration.
pub fn create_client(config: &CompletionConfig) -> Result<Arc<dyn CompletionClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClient)),
        "openai" => Ok(Arc::new(OpenAiClient::new(config))),
        other => bail!("Unknown completion provider: {}", other),
    }
}
