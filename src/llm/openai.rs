//! OpenAI-compatible chat-completions client.

use super::{ChatModel, ChatRequest, ChatResponse, LlmError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// HTTP client for any endpoint speaking the chat-completions protocol.
pub struct OpenAiClient {
    api_url: String,
    api_key: Option<String>,
    api_key_env: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client, reading the bearer token from `api_key_env`.
    ///
    /// A missing key is not an error here; it surfaces from
    /// [`ChatModel::check_ready`] so the engine can report it as a
    /// configuration failure.
    pub fn from_env(api_url: &str, api_key_env: &str, timeout_seconds: u64) -> Result<Self, LlmError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(api_url, api_key, api_key_env, timeout_seconds)
    }

    pub fn new(
        api_url: &str,
        api_key: Option<String>,
        api_key_env: &str,
        timeout_seconds: u64,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_env: api_key_env.to_string(),
            timeout_seconds,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn check_ready(&self) -> Result<(), LlmError> {
        if self.api_key.is_none() {
            return Err(LlmError::Configuration(format!(
                "missing API key: set the {} environment variable",
                self.api_key_env
            )));
        }
        Ok(())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::Configuration(format!("missing API key ({})", self.api_key_env))
        })?;

        debug!(
            "Sending chat request with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Transport(format!(
                        "request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    LlmError::Transport(format!("cannot connect to {}", self.api_url))
                } else {
                    LlmError::Transport(format!("failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| LlmError::Protocol(format!("failed to parse chat response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_configuration_error() {
        let client = OpenAiClient::new("https://api.openai.com/v1", None, "TEST_KEY", 30).unwrap();
        let err = client.check_ready().unwrap_err();
        assert!(matches!(err, LlmError::Configuration(_)));
        assert!(err.to_string().contains("TEST_KEY"));
    }

    #[test]
    fn test_present_key_is_ready() {
        let client =
            OpenAiClient::new("https://api.openai.com/v1", Some("sk-test".into()), "TEST_KEY", 30)
                .unwrap();
        assert!(client.check_ready().is_ok());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiClient::new("http://localhost:8080/v1/", None, "K", 5).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
