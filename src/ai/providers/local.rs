//! Local model served behind an OpenAI-compatible API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ai::{AiProvider, HistoryEntry, SYSTEM_PROMPT};
use crate::errors::ProviderError;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOCAL_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct-AWQ";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct LocalProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl LocalProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the model server answers its health check
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::ConnectionFailure {
                provider: "local LLM".to_string(),
                endpoint: self.base_url.clone(),
            }
        } else {
            ProviderError::RequestFailed {
                provider: "Local LLM".to_string(),
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl AiProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn respond(
        &self,
        history: &[HistoryEntry],
        message: &str,
        _work_dir: Option<&Path>,
    ) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        });
        messages.extend(history.iter().map(|h| ChatMessage {
            role: h.role.as_str(),
            content: &h.content,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: message,
        });

        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let res = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !res.status().is_success() {
            return Err(ProviderError::RequestFailed {
                provider: "Local LLM".to_string(),
                message: res.status().as_u16().to_string(),
            });
        }

        let parsed: ChatResponse = res.json().await.map_err(|e| ProviderError::RequestFailed {
            provider: "Local LLM".to_string(),
            message: e.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::RequestFailed {
                provider: "Local LLM".to_string(),
                message: "response contained no choices".to_string(),
            })
    }
}
