//! Chat-completions client.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default). Failures are classified here, where the status code and body
//! are still available, so the retry loop never has to parse text.

use crate::resilience::{AttemptError, Backend, ErrorKind};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Settings shared by every request, whatever the backend.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 2048,
            frequency_penalty: 0.1,
            timeout_seconds: 20,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Chat completions API request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    stream: bool,
}

/// Chat completions API response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Something that can answer a chat conversation on a given backend.
pub trait Completion: Send + Sync {
    fn complete<'a>(
        &'a self,
        backend: &'a Backend,
        messages: &'a [ChatMessage],
    ) -> BoxFuture<'a, Result<String, AttemptError>>;
}

/// HTTP client for the chat completions API.
pub struct ChatClient {
    settings: LlmSettings,
    http_client: reqwest::Client,
}

impl ChatClient {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    async fn send(&self, backend: &Backend, messages: &[ChatMessage]) -> Result<String, AttemptError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.api_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: backend.name(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            frequency_penalty: self.settings.frequency_penalty,
            stream: false,
        };

        debug!(
            "Sending chat request to {} with {} messages",
            backend,
            messages.len()
        );

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(ref key) = self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::other(format!(
                    "Request timed out after {}s",
                    self.settings.timeout_seconds
                ))
            } else if e.is_connect() {
                AttemptError::other(format!("Cannot connect to {}", self.settings.api_url))
            } else {
                AttemptError::from_message(format!("Failed to send request: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("API error {} from {}: {}", status, backend, body);
            return Err(AttemptError {
                kind: classify_status(status.as_u16(), &body),
                message,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::other(format!("Failed to parse API response: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AttemptError::other(format!("Empty response from {}", backend)))?;

        Ok(strip_reasoning(&content))
    }
}

impl Completion for ChatClient {
    fn complete<'a>(
        &'a self,
        backend: &'a Backend,
        messages: &'a [ChatMessage],
    ) -> BoxFuture<'a, Result<String, AttemptError>> {
        self.send(backend, messages).boxed()
    }
}

/// Decide how a failed HTTP response should be retried.
pub fn classify_status(status: u16, body: &str) -> ErrorKind {
    if status == 429 {
        ErrorKind::RateLimited
    } else {
        ErrorKind::classify_message(body)
    }
}

/// Drop `<think>...</think>` blocks emitted by reasoning models.
pub fn strip_reasoning(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("<think>") {
        output.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    output.push_str(rest);

    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(429, ""), ErrorKind::RateLimited);
        assert_eq!(
            classify_status(
                413,
                r#"{"error":{"code":"rate_limit_exceeded","message":"tokens per minute"}}"#
            ),
            ErrorKind::RateLimited
        );
        assert_eq!(classify_status(500, "internal error"), ErrorKind::Other);
        assert_eq!(classify_status(400, "invalid model"), ErrorKind::Other);
    }

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(
            strip_reasoning("<think>let me see</think>\n# Sales Analysis"),
            "# Sales Analysis"
        );
        assert_eq!(strip_reasoning("a<think>x</think>b<think>y</think>c"), "abc");
        assert_eq!(strip_reasoning("plain answer "), "plain answer");
        assert_eq!(strip_reasoning("kept<think>unterminated"), "kept");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "gemma2-9b-it",
            messages: &messages,
            temperature: 0.0,
            max_tokens: 2048,
            frequency_penalty: 0.1,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gemma2-9b-it");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello");
    }

    #[test]
    fn test_client_builds() {
        assert!(ChatClient::new(LlmSettings::default()).is_ok());
    }
}
