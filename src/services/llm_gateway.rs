use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rate limited. Please try again in a moment.")]
    RateLimited,
    #[error("AI usage limit reached. Please add credits.")]
    UsageLimit,
    #[error("AI gateway error")]
    Upstream { status: u16, body: String },
    #[error("AI gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI gateway returned an unreadable envelope: {0}")]
    Envelope(String),
}

/// A chat-completion backend that answers one system + user exchange with text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmGateway {
    http_client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl LlmGateway {
    pub fn new(config: &LlmConfig) -> Result<Self, GatewayError> {
        let http_client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http_client,
            url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for LlmGateway {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GatewayError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .http_client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited,
                StatusCode::PAYMENT_REQUIRED => GatewayError::UsageLimit,
                _ => {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    log::error!("AI gateway error: {} {}", status.as_u16(), body);
                    GatewayError::Upstream {
                        status: status.as_u16(),
                        body,
                    }
                }
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Envelope(e.to_string()))?;

        // No content is passed through as empty text and fails later as an invalid format.
        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}
