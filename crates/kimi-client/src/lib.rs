//! Chat-completions client for the Moonshot/Kimi API.
//!
//! The endpoint is OpenAI-compatible: a single `POST {base_url}/chat/completions`
//! per call, one choice per completion, reply constrained to a JSON object.

pub mod error;

pub use error::{ClientError, Result};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";
const DEFAULT_MODEL: &str = "kimi-latest";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request/response seam over the hosted model, so batch logic can run
/// against scripted fakes in tests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one conversation and return the raw text of the single reply.
    async fn send(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Identifier recorded alongside generated rows.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct KimiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for KimiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    response_format: ResponseFormat,
    n: u8,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// HTTP client over the Kimi chat-completions endpoint.
///
/// The request timeout is enforced at the `reqwest` client level; an expired
/// call surfaces as [`ClientError::Http`] like any other transport failure.
pub struct KimiClient {
    http: reqwest::Client,
    config: KimiConfig,
}

impl KimiClient {
    pub fn new(config: KimiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatModel for KimiClient {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            n: 1,
        };

        debug!(
            model = %self.config.model,
            turns = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyCompletion)?;

        Ok(choice.message.content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
