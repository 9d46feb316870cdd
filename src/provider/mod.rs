use std::env;

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::web::models::Message;

/// Failure modes of a completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The provider rejected the call (quota, auth, bad model name, rate
    /// limit, content policy). Carries the provider's own error text.
    #[error("{0}")]
    Rejected(String),
    #[error("request to completion provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// The external completion capability. Kept as a trait object so the relay
/// and the HTTP handlers can be exercised against deterministic stubs.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError>;
}

// A client for any OpenAI-compatible chat completions API
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiClient {
    /// Reads `OPENAI_API_KEY` and `OPENAI_API_BASE` from the environment.
    /// A missing key is fatal: the process must not start without a credential.
    pub fn from_env() -> Result<Self> {
        let api_key = match env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("No OPENAI_API_KEY provided in environment variables"),
        };

        let base_url = env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());

        info!("Using completion provider at: {}", base_url);

        Ok(Self::new(base_url, api_key))
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Pulls the provider's own error text out of an error response body
    /// (`{"error": {"message": ...}}`), falling back to the raw body.
    fn error_text(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let payload = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature
        });

        debug!("Payload: {}", payload);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await?;
            return Err(CompletionError::Rejected(Self::error_text(&body)));
        }

        let response_json: Value = response.json().await?;
        debug!("Response JSON: {}", response_json);

        // The single top-ranked completion is the assistant reply
        let content = response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                CompletionError::MalformedResponse(
                    "no choices[0].message.content in response".to_string(),
                )
            })?;

        info!("Response length: {} characters", content.len());
        Ok(content.to_string())
    }
}
