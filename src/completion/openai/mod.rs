
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatMessage, CompletionProvider};
use crate::config::CompletionConfig;
use crate::{LoreError, Result};

/// Client for any server exposing `POST /v1/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    extra_headers: BTreeMap<String, String>,
    max_tokens: Option<u32>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl OpenAiCompatibleClient {
    #[inline]
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| LoreError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            endpoint: format!(
                "{}/v1/chat/completions",
                base_url.as_str().trim_end_matches('/')
            ),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            extra_headers: config.headers.clone(),
            max_tokens: config.max_tokens,
            agent,
        })
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one chat request and return the first choice's content
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let body = serde_json::to_string(&ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: self.max_tokens,
        })
        .map_err(|e| LoreError::ProviderCall(format!("Failed to encode request: {}", e)))?;

        debug!(
            "Sending {} messages to {} with model {}",
            messages.len(),
            self.endpoint,
            self.model
        );

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {}", api_key));
        }
        for (name, value) in &self.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response_text = request
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                warn!("Completion request to {} failed: {}", self.endpoint, e);
                LoreError::ProviderCall(e.to_string())
            })?;

        parse_completion(&response_text)
    }
}

/// Pull `choices[0].message.content` out of a chat completion response
#[inline]
pub fn parse_completion(response_text: &str) -> Result<String> {
    let data: Value = serde_json::from_str(response_text)
        .map_err(|e| LoreError::ProviderCall(format!("Malformed provider response: {}", e)))?;

    let choice = data
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| LoreError::ProviderCall("No choices returned from provider".to_string()))?;

    choice
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            LoreError::ProviderCall("Provider response missing message.content".to_string())
        })
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    #[inline]
    async fn complete(&self, messages: &[ChatMessage], temperature: f64) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();

        tokio::task::spawn_blocking(move || client.chat(&messages, temperature))
            .await
            .map_err(|e| LoreError::ProviderCall(format!("Completion task failed: {}", e)))?
    }
}
