//! Conversational AI sessions
//!
//! - `providers` - interchangeable backends (local model, Gemini, agent CLI)
//! - `session` - one conversation: history window and working directory
//! - `registry` - `AiSessionRegistry`, sessions keyed by (container, provider)

pub mod providers;
pub mod registry;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ProviderError;

pub use providers::{AgentCliProvider, GeminiProvider, LocalProvider};
pub use registry::{AiSessionRegistry, SessionHandle};
pub use session::AiSession;

/// Prompt shared by the conversational providers; replies are spoken aloud.
pub const SYSTEM_PROMPT: &str = "You are a voice assistant engaged in natural spoken conversation. Your responses will be converted to speech, so:

- Keep responses concise (1-3 sentences) unless asked to elaborate
- Use natural, conversational language as if speaking aloud
- Avoid markdown, bullet points, or formatting that doesn't translate to speech
- Don't use asterisks, brackets, or special characters
- When asked to expand or explain more, provide fuller responses
- Be warm and personable while remaining helpful and accurate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A backend that answers one message given the prior conversation.
///
/// Providers are stateless; history is owned by the calling [`AiSession`].
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Registry key, e.g. `"local"`
    fn name(&self) -> &str;

    async fn respond(
        &self,
        history: &[HistoryEntry],
        message: &str,
        work_dir: Option<&Path>,
    ) -> Result<String, ProviderError>;
}
