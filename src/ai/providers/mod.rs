// Conversational provider implementations

mod agent_cli;
mod gemini;
mod local;

use std::sync::Arc;
use std::time::Duration;

pub use agent_cli::AgentCliProvider;
pub use gemini::{GeminiProvider, DEFAULT_GEMINI_MODEL};
pub use local::{LocalProvider, DEFAULT_LOCAL_MODEL, DEFAULT_LOCAL_URL};

use super::AiProvider;
use crate::agents::AgentCli;
use crate::config::ProvidersConfig;

/// Build the standard provider set (`local`, `gemini`, `claude`) from config
pub fn default_providers(config: &ProvidersConfig, agent: &AgentCli) -> Vec<Arc<dyn AiProvider>> {
    let gemini_key = config
        .gemini_api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());

    if gemini_key.is_none() {
        log::warn!("[Sessions] GEMINI_API_KEY not set; gemini requests will fail");
    }

    vec![
        Arc::new(LocalProvider::new(
            config.local_url.as_str(),
            config.local_model.as_str(),
            Duration::from_secs(config.local_timeout_secs),
        )),
        Arc::new(GeminiProvider::new(gemini_key, config.gemini_model.as_str())),
        Arc::new(AgentCliProvider::new(agent.clone())),
    ]
}
