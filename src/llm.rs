//! LLM gateway: one-shot completions against an OpenAI-compatible endpoint.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::prompts::Prompt;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// The completion seam. One request, one response, no retries — every call
/// site substitutes its own static fallback on failure.
#[async_trait::async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Production gateway over `{base_url}/chat/completions`.
pub struct LlmGateway {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl LlmGateway {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl ChatCompleter for LlmGateway {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: prompt.max_tokens,
            temperature: prompt.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmError::Request(error.to_string()))?
            .error_for_status()
            .map_err(|error| LlmError::Request(error.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Request(error.to_string()))?;

        let choice = body.choices.into_iter().next().ok_or(LlmError::EmptyCompletion)?;
        Ok(choice.message.content.trim().to_string())
    }
}
