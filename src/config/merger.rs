// Configuration merging with priority

use crate::config::loader::{
    AgentConfig, AppConfig, GitConfig, ProvidersConfig, QueueConfig, ServerConfig,
    WorkspaceConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Partial configuration for merging
/// Uses Option<T> for all fields so a layer only overrides what it sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialConfig {
    #[serde(default)]
    pub workspace: Option<PartialWorkspaceConfig>,
    #[serde(default)]
    pub agent: Option<PartialAgentConfig>,
    #[serde(default)]
    pub git: Option<PartialGitConfig>,
    #[serde(default)]
    pub queue: Option<PartialQueueConfig>,
    #[serde(default)]
    pub providers: Option<PartialProvidersConfig>,
    #[serde(default)]
    pub server: Option<PartialServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialWorkspaceConfig {
    pub work_dir: Option<PathBuf>,
    pub worktrees_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialAgentConfig {
    pub executable: Option<String>,
    pub plan_timeout_secs: Option<u64>,
    pub chat_timeout_secs: Option<u64>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialGitConfig {
    pub executable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialQueueConfig {
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialProvidersConfig {
    pub default_provider: Option<String>,
    pub local_url: Option<String>,
    pub local_model: Option<String>,
    pub local_timeout_secs: Option<u64>,
    pub gemini_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub history_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PartialServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Configuration merger
/// Priority order: CLI -> Project -> Global -> Defaults
pub struct ConfigMerger {
    defaults: AppConfig,
    global: Option<PartialConfig>,
    project: Option<PartialConfig>,
    cli: Option<PartialConfig>,
}

impl ConfigMerger {
    pub fn new() -> Self {
        Self {
            defaults: AppConfig::default(),
            global: None,
            project: None,
            cli: None,
        }
    }

    pub fn with_global(mut self, config: Option<PartialConfig>) -> Self {
        self.global = config;
        self
    }

    pub fn with_project(mut self, config: Option<PartialConfig>) -> Self {
        self.project = config;
        self
    }

    pub fn with_cli(mut self, config: Option<PartialConfig>) -> Self {
        self.cli = config;
        self
    }

    /// Merge all layers with priority
    pub fn merge(&self) -> AppConfig {
        [&self.global, &self.project, &self.cli]
            .into_iter()
            .flatten()
            .fold(self.defaults.clone(), |acc, layer| merge_partial(&acc, layer))
    }
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay one partial layer onto a full config
pub fn merge_partial(base: &AppConfig, partial: &PartialConfig) -> AppConfig {
    AppConfig {
        workspace: partial
            .workspace
            .as_ref()
            .map(|p| merge_workspace(&base.workspace, p))
            .unwrap_or_else(|| base.workspace.clone()),
        agent: partial
            .agent
            .as_ref()
            .map(|p| merge_agent(&base.agent, p))
            .unwrap_or_else(|| base.agent.clone()),
        git: partial
            .git
            .as_ref()
            .map(|p| GitConfig {
                executable: p.executable.clone().unwrap_or_else(|| base.git.executable.clone()),
            })
            .unwrap_or_else(|| base.git.clone()),
        queue: partial
            .queue
            .as_ref()
            .map(|p| QueueConfig {
                idle_timeout_ms: p.idle_timeout_ms.unwrap_or(base.queue.idle_timeout_ms),
            })
            .unwrap_or_else(|| base.queue.clone()),
        providers: partial
            .providers
            .as_ref()
            .map(|p| merge_providers(&base.providers, p))
            .unwrap_or_else(|| base.providers.clone()),
        server: partial
            .server
            .as_ref()
            .map(|p| merge_server(&base.server, p))
            .unwrap_or_else(|| base.server.clone()),
    }
}

fn merge_workspace(base: &WorkspaceConfig, p: &PartialWorkspaceConfig) -> WorkspaceConfig {
    WorkspaceConfig {
        work_dir: p.work_dir.clone().unwrap_or_else(|| base.work_dir.clone()),
        worktrees_dir: p
            .worktrees_dir
            .clone()
            .or_else(|| base.worktrees_dir.clone()),
    }
}

fn merge_agent(base: &AgentConfig, p: &PartialAgentConfig) -> AgentConfig {
    AgentConfig {
        executable: p.executable.clone().unwrap_or_else(|| base.executable.clone()),
        plan_timeout_secs: p.plan_timeout_secs.unwrap_or(base.plan_timeout_secs),
        chat_timeout_secs: p.chat_timeout_secs.unwrap_or(base.chat_timeout_secs),
        model: p.model.clone().or_else(|| base.model.clone()),
    }
}

fn merge_providers(base: &ProvidersConfig, p: &PartialProvidersConfig) -> ProvidersConfig {
    ProvidersConfig {
        default_provider: p
            .default_provider
            .clone()
            .unwrap_or_else(|| base.default_provider.clone()),
        local_url: p.local_url.clone().unwrap_or_else(|| base.local_url.clone()),
        local_model: p.local_model.clone().unwrap_or_else(|| base.local_model.clone()),
        local_timeout_secs: p.local_timeout_secs.unwrap_or(base.local_timeout_secs),
        gemini_model: p
            .gemini_model
            .clone()
            .unwrap_or_else(|| base.gemini_model.clone()),
        gemini_api_key: p
            .gemini_api_key
            .clone()
            .or_else(|| base.gemini_api_key.clone()),
        history_window: p.history_window.unwrap_or(base.history_window),
    }
}

fn merge_server(base: &ServerConfig, p: &PartialServerConfig) -> ServerConfig {
    ServerConfig {
        bind: p.bind.clone().unwrap_or_else(|| base.bind.clone()),
        port: p.port.unwrap_or(base.port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_layer(executable: Option<&str>, plan: Option<u64>) -> PartialConfig {
        PartialConfig {
            agent: Some(PartialAgentConfig {
                executable: executable.map(str::to_string),
                plan_timeout_secs: plan,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_when_no_layers() {
        assert_eq!(ConfigMerger::new().merge(), AppConfig::default());
    }

    #[test]
    fn test_priority_cli_over_project_over_global() {
        let merged = ConfigMerger::new()
            .with_global(Some(agent_layer(Some("global-agent"), Some(10))))
            .with_project(Some(agent_layer(Some("project-agent"), None)))
            .with_cli(Some(agent_layer(None, Some(30))))
            .merge();

        assert_eq!(merged.agent.executable, "project-agent");
        assert_eq!(merged.agent.plan_timeout_secs, 30);
        // Untouched fields keep defaults
        assert_eq!(merged.agent.chat_timeout_secs, 60);
    }

    #[test]
    fn test_partial_layer_keeps_other_sections() {
        let layer = PartialConfig {
            server: Some(PartialServerConfig {
                port: Some(9000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = ConfigMerger::new().with_project(Some(layer)).merge();
        assert_eq!(merged.server.port, 9000);
        assert_eq!(merged.server.bind, "0.0.0.0");
        assert_eq!(merged.providers, ProvidersConfig::default());
    }

    #[test]
    fn test_parse_partial_from_toml() {
        let partial: PartialConfig = toml::from_str(
            r#"
            [workspace]
            work_dir = "/srv/code"

            [providers]
            local_url = "http://gpu-box:8080"
            history_window = 10
            "#,
        )
        .unwrap();

        let merged = merge_partial(&AppConfig::default(), &partial);
        assert_eq!(merged.workspace.work_dir, PathBuf::from("/srv/code"));
        assert_eq!(merged.providers.local_url, "http://gpu-box:8080");
        assert_eq!(merged.providers.history_window, 10);
        assert_eq!(merged.providers.default_provider, "gemini");
    }
}
