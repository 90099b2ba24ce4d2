//! Google Gemini REST provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ai::{AiProvider, HistoryEntry, Role, SYSTEM_PROMPT};
use crate::errors::ProviderError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Debug, PartialEq)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug, PartialEq)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResContent,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    #[serde(default)]
    text: String,
}

pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_failed(message: impl Into<String>) -> ProviderError {
        ProviderError::RequestFailed {
            provider: "Gemini".to_string(),
            message: message.into(),
        }
    }
}

/// Build Gemini `contents`, merging consecutive same-role turns since the API
/// requires strictly alternating roles.
fn build_contents(history: &[HistoryEntry], message: &str) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::with_capacity(history.len() + 1);
    let turns = history
        .iter()
        .map(|h| (h.role, h.content.as_str()))
        .chain(std::iter::once((Role::User, message)));

    for (role, text) in turns {
        let role = match role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        match contents.last_mut() {
            Some(last) if last.role == Some(role) => {
                if let Some(part) = last.parts.first_mut() {
                    part.text.push('\n');
                    part.text.push_str(text);
                }
            }
            _ => contents.push(GeminiContent {
                role: Some(role),
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }),
        }
    }

    contents
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn respond(
        &self,
        history: &[HistoryEntry],
        message: &str,
        _work_dir: Option<&Path>,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: "Gemini".to_string(),
                message: "GEMINI_API_KEY environment variable not set".to_string(),
            })?;

        let req = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: build_contents(history, message),
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let res = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ConnectionFailure {
                        provider: "Gemini".to_string(),
                        endpoint: self.base_url.clone(),
                    }
                } else {
                    Self::request_failed(e.to_string())
                }
            })?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(Self::request_failed(format!("{} {}", status, body.trim())));
        }

        let parsed: GeminiResponse = res
            .json()
            .await
            .map_err(|e| Self::request_failed(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| Self::request_failed("response contained no candidates"))?;

        Ok(text)
    }
}
