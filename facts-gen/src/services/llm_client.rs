//! LLM gateway client
//!
//! Thin client over an OpenAI-compatible `POST {base_url}/chat/completions`
//! endpoint.
//!
//! **Retry policy:**
//! - at most `retry.max-attempts` HTTP calls (never fewer than one)
//! - exponential backoff from `retry.backoff-ms`, multiplier 2, ±40% jitter
//! - retried: transport errors, 429, 5xx
//! - not retried: other 4xx, empty choices, undecodable bodies
//! - `timeout-ms` bounds the whole call, backoff sleeps included

use crate::utils::Backoff;
use async_trait::async_trait;
use facts_common::config::ProxyApiSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const RETRY_MULTIPLIER: f64 = 2.0;
const RETRY_JITTER: f64 = 0.4;

/// Gateway client errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("LLM gateway error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("LLM gateway returned empty choices")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Transport failures, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that turns a conversation into the assistant's text
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible gateway client
pub struct LlmGatewayClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    max_attempts: u32,
    backoff: Backoff,
}

impl LlmGatewayClient {
    pub fn new(settings: &ProxyApiSettings) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let backoff = Backoff::exponential(
            Duration::from_millis(settings.retry.backoff_ms.max(1)),
            RETRY_MULTIPLIER,
        )
        .with_jitter(RETRY_JITTER);

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_millis(settings.timeout_ms),
            max_attempts: settings.retry.effective_attempts(),
            backoff,
        })
    }

    async fn send_with_retry(&self, request: &ChatCompletionRequest<'_>) -> Result<String, LlmError> {
        let mut attempt = 1;

        loop {
            match self.send_once(request).await {
                Ok(content) => return Ok(content),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "LLM gateway call failed, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, request: &ChatCompletionRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl ChatCompletion for LlmGatewayClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        info!(
            model = %self.model,
            endpoint = %self.endpoint,
            messages = messages.len(),
            "Calling LLM gateway"
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        match tokio::time::timeout(self.timeout, self.send_with_retry(&request)).await {
            Ok(Ok(content)) => {
                info!(chars = content.chars().count(), "LLM gateway responded");
                debug!(content = %content, "LLM raw content");
                Ok(content)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "LLM gateway call failed");
                Err(err)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "LLM gateway call timed out");
                Err(LlmError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::NetworkError("reset".into()).is_retryable());
        assert!(LlmError::ApiError { status: 429, body: String::new() }.is_retryable());
        assert!(LlmError::ApiError { status: 500, body: String::new() }.is_retryable());
        assert!(LlmError::ApiError { status: 503, body: String::new() }.is_retryable());

        assert!(!LlmError::ApiError { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::ApiError { status: 401, body: String::new() }.is_retryable());
        assert!(!LlmError::ApiError { status: 404, body: String::new() }.is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::MissingApiKey.is_retryable());
        assert!(!LlmError::ParseError("eof".into()).is_retryable());
        assert!(!LlmError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("usr")];
        let request = ChatCompletionRequest {
            model: "openai/gpt-4o-mini",
            messages: &messages,
            temperature: 0.2,
            max_tokens: 600,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "openai/gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "usr");
        assert_eq!(value["temperature"], 0.2);
        assert_eq!(value["max_tokens"], 600);
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let settings = ProxyApiSettings {
            base_url: "http://gateway/v1/".to_string(),
            ..Default::default()
        };
        let client = LlmGatewayClient::new(&settings).unwrap();
        assert_eq!(client.endpoint, "http://gateway/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let settings = ProxyApiSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "   ".to_string(),
            ..Default::default()
        };
        let client = LlmGatewayClient::new(&settings).unwrap();

        let result = client.complete(&[ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }
}
