
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, ChatModel, build_agent, provider_error, send_with_retry};
use crate::config::Config;
use crate::{AssistError, Result as AssistResult};

/// OpenAI-compatible chat completions client
///
/// Works with Groq, OpenAI, OpenRouter and any other provider that serves
/// `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature: 0.2,
            agent: build_agent(Duration::from_secs(60)),
            retry_attempts: 1,
        }
    }

    /// Build a client from the `[llm]` section, reading the key from the environment
    #[inline]
    pub fn from_config(config: &Config) -> AssistResult<Self> {
        let api_key = std::env::var(&config.llm.api_key_env).map_err(|_| {
            AssistError::Config(format!(
                "{} is not set; export it or switch the llm provider to ollama",
                config.llm.api_key_env
            ))
        })?;

        Ok(Self::new(&config.llm.base_url, &config.llm.model, api_key)
            .with_temperature(config.llm.temperature)
            .with_timeout(Duration::from_secs(config.llm.request_timeout_secs))
            .with_retry_attempts(config.llm.retry_attempts))
    }

    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Send a chat completion request and return the first choice's text
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self.completions_url();
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize completion request")?;

        debug!("Sending {} message(s) to {}", messages.len(), self.model);

        let response_text = send_with_retry(&url, self.retry_attempts, || {
            self.agent
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to get chat completion")?;

        parse_completion(&response_text)
    }
}

fn parse_completion(body: &str) -> Result<String> {
    let response: CompletionResponse =
        serde_json::from_str(body).context("Failed to parse completion response")?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow::anyhow!("Completion response contained no message content"))
}

impl ChatModel for OpenAiClient {
    fn complete(&self, messages: &[ChatMessage]) -> AssistResult<String> {
        self.chat(messages).map_err(|e| provider_error(&e))
    }
}
