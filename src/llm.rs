//! OpenAI-compatible chat completion client.
//!
//! Sends `POST {url}/chat/completions` with the model, messages and
//! sampling options of a [`ChatRequest`] and returns the first choice's
//! message content. Works against any server speaking the same API.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use repochat_core::answer::{ChatModel, ChatRequest};
use repochat_core::error::RagError;

use crate::config::ChatConfig;

pub struct OpenAiChat {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

fn chat_err(e: impl std::fmt::Display) -> RagError {
    RagError::Chat(e.to_string())
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> repochat_core::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Chat("OPENAI_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(chat_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Chat(format!("chat API error {}: {}", status, text)));
        }

        let parsed: CompletionResponse = response.json().await.map_err(chat_err)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::Chat("chat response contained no message".to_string()))?;

        tracing::debug!(model = %self.model, chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repochat_core::answer::ChatMessage;
    use repochat_core::models::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ChatConfig {
        ChatConfig {
            url: format!("{}/v1", server.uri()),
            ..ChatConfig::default()
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: "be brief".to_string(),
                },
                ChatMessage {
                    role: Role::User,
                    content: "what is this?".to_string(),
                },
            ],
            temperature: 0.5,
            max_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn test_complete_sends_messages_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "what is this?"}
                ],
                "temperature": 0.5,
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "A demo repo."}},
                    {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&config(&server), Some("sk-test".to_string())).unwrap();
        assert_eq!(chat.complete(&request()).await.unwrap(), "A demo repo.");
    }

    #[tokio::test]
    async fn test_error_status_is_chat_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&config(&server), Some("k".to_string())).unwrap();
        let err = chat.complete(&request()).await.unwrap_err();
        assert_eq!(err.code(), "chat");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&config(&server), Some("k".to_string())).unwrap();
        assert!(chat.complete(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&config(&server), None).unwrap();
        let err = chat.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
