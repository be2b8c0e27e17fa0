//! Blocking client for OpenRouter's OpenAI-compatible chat completions API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use super::{EnrichmentClient, RawResponse};
use crate::error::AttemptError;
use crate::prompt::{user_message, SYSTEM_PROMPT};
use crate::record::Record;

/// Default API root; `/chat/completions` is appended.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Connection and sampling settings for [`OpenRouterClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Bearer credential.
    pub api_key: String,
    /// API root, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
    /// Model identifier, e.g. `google/gemini-2.0-flash-001`.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

/// Sends one chat-completion request per record.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenRouterClient {
    /// Builds a client with the bearer header and timeout baked in.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        anyhow::ensure!(
            !settings.api_key.trim().is_empty(),
            "missing OpenRouter API key"
        );
        anyhow::ensure!(!settings.model.trim().is_empty(), "missing model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", settings.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenRouter API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenRouter HTTP client")?;
        let endpoint = format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

impl EnrichmentClient for OpenRouterClient {
    fn enrich(&self, record: &Record) -> Result<RawResponse, AttemptError> {
        let user = user_message(record);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(classify_transport)?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(classify_transport)?;
        Ok(RawResponse::new(status, text))
    }
}

fn classify_transport(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::TransportTimeout
    } else {
        AttemptError::Transport(err.to_string())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}
