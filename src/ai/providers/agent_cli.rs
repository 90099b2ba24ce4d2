//! Coding agent CLI used as a conversational provider

use async_trait::async_trait;
use std::path::Path;

use crate::agents::{AgentCli, AgentMode};
use crate::ai::{AiProvider, HistoryEntry, SYSTEM_PROMPT};
use crate::errors::ProviderError;

/// Answers in print mode with tools disabled, running in the session's
/// working directory so repository questions have the right context.
pub struct AgentCliProvider {
    cli: AgentCli,
}

impl AgentCliProvider {
    pub fn new(cli: AgentCli) -> Self {
        Self { cli }
    }
}

/// The CLI has no multi-turn API; prior turns are folded into one prompt.
fn fold_prompt(history: &[HistoryEntry], message: &str) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);
    if !history.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        for entry in history {
            let speaker = match entry.role {
                crate::ai::Role::User => "User",
                crate::ai::Role::Assistant => "Assistant",
            };
            prompt.push_str(speaker);
            prompt.push_str(": ");
            prompt.push_str(&entry.content);
            prompt.push('\n');
        }
    }
    prompt.push_str("\nUser: ");
    prompt.push_str(message);
    prompt
}

#[async_trait]
impl AiProvider for AgentCliProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn respond(
        &self,
        history: &[HistoryEntry],
        message: &str,
        work_dir: Option<&Path>,
    ) -> Result<String, ProviderError> {
        let prompt = fold_prompt(history, message);
        let output = self
            .cli
            .command(AgentMode::Chat, &prompt, work_dir)
            .run_checked()
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}
