use super::traits::{Generator, TokenSink};
use super::types::{Message, Role};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-endpoint generator for a local Ollama server.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    temperature: f64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, temperature: f64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            client: Client::builder()
                .timeout(Duration::from_secs(300)) // local models may be slow
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(
        &self,
        messages: &[Message],
        on_token: Option<TokenSink>,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: Self::role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: Options {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(sink) = on_token {
            // Non-streaming endpoint: deliver the completion as one chunk.
            sink(&parsed.message.content);
        }

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_stripped() {
        let generator = OllamaGenerator::new("http://localhost:11434/", "m", 0.5);
        assert_eq!(generator.base_url, "http://localhost:11434");
    }

    #[test]
    fn request_serializes_roles() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: OllamaGenerator::role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: Options { temperature: 0.1 },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"stream\":false"));
    }
}
