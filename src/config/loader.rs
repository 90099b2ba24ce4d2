// Configuration file loading

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agents::AgentCli;
use crate::config::merger::PartialConfig;

/// Directory name used for both the global and per-project config
pub const CONFIG_DIR_NAME: &str = "vox-relay";
const PROJECT_CONFIG_DIR: &str = ".vox-relay";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Fully resolved application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where containers work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Default (non-worktree) working directory
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Root for worktrees; defaults to `.worktrees` beside `work_dir`
    #[serde(default)]
    pub worktrees_dir: Option<PathBuf>,
}

pub fn default_work_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("dev"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            worktrees_dir: None,
        }
    }
}

/// Agent CLI settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_executable")]
    pub executable: String,
    #[serde(default = "default_agent_timeout")]
    pub plan_timeout_secs: u64,
    #[serde(default = "default_agent_timeout")]
    pub chat_timeout_secs: u64,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_agent_executable() -> String { "claude".to_string() }
fn default_agent_timeout() -> u64 { 60 }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            executable: default_agent_executable(),
            plan_timeout_secs: default_agent_timeout(),
            chat_timeout_secs: default_agent_timeout(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default = "default_git_executable")]
    pub executable: String,
}

fn default_git_executable() -> String { "git".to_string() }

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: default_git_executable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long an idle processor waits for new work before exiting
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_idle_timeout_ms() -> u64 { 1000 }

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

/// Conversational provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider used by direct chat requests that don't name one
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_local_url")]
    pub local_url: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Falls back to `GEMINI_API_KEY` when unset
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    /// Conversation exchanges kept per session
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_provider() -> String { "gemini".to_string() }
fn default_local_url() -> String { crate::ai::providers::DEFAULT_LOCAL_URL.to_string() }
fn default_local_model() -> String { crate::ai::providers::DEFAULT_LOCAL_MODEL.to_string() }
fn default_local_timeout() -> u64 { 120 }
fn default_gemini_model() -> String { crate::ai::providers::DEFAULT_GEMINI_MODEL.to_string() }
fn default_history_window() -> usize { 20 }

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            local_url: default_local_url(),
            local_model: default_local_model(),
            local_timeout_secs: default_local_timeout(),
            gemini_model: default_gemini_model(),
            gemini_api_key: None,
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Resolved worktrees root
    pub fn worktrees_dir(&self) -> PathBuf {
        if let Some(dir) = &self.workspace.worktrees_dir {
            return dir.clone();
        }
        match self.workspace.work_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(".worktrees"),
            _ => self.workspace.work_dir.join(".worktrees"),
        }
    }

    pub fn agent_cli(&self) -> AgentCli {
        AgentCli {
            executable: self.agent.executable.clone(),
            model: self.agent.model.clone(),
            plan_timeout: Duration::from_secs(self.agent.plan_timeout_secs),
            chat_timeout: Duration::from_secs(self.agent.chat_timeout_secs),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.queue.idle_timeout_ms)
    }

    /// Validate config values
    pub fn validate(&self) -> Result<()> {
        if self.agent.executable.trim().is_empty() {
            return Err(anyhow!("agent.executable cannot be empty"));
        }
        if self.git.executable.trim().is_empty() {
            return Err(anyhow!("git.executable cannot be empty"));
        }
        if self.agent.plan_timeout_secs == 0 || self.agent.chat_timeout_secs == 0 {
            return Err(anyhow!("agent timeouts must be greater than 0"));
        }
        if self.queue.idle_timeout_ms == 0 {
            return Err(anyhow!("queue.idle_timeout_ms must be greater than 0"));
        }
        if self.providers.history_window == 0 {
            return Err(anyhow!("providers.history_window must be greater than 0"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be greater than 0"));
        }
        Ok(())
    }
}

/// Locates and reads config files
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_path: Self::get_global_config_path(),
            project_path: None,
        }
    }

    /// Use an explicit file instead of the per-user global config
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Set the project (working directory) whose config should be read
    pub fn with_project_path(mut self, path: &Path) -> Self {
        self.project_path = Some(path.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME));
        self
    }

    fn get_global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn global_config_path(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn load_global(&self) -> Result<Option<PartialConfig>> {
        match self.global_path {
            Some(ref path) => self.load_from_path(path),
            None => Ok(None),
        }
    }

    pub fn load_project(&self) -> Result<Option<PartialConfig>> {
        match self.project_path {
            Some(ref path) => self.load_from_path(path),
            None => Ok(None),
        }
    }

    /// Load a config layer; a missing file is not an error
    pub fn load_from_path(&self, path: &Path) -> Result<Option<PartialConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: PartialConfig = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;

        log::debug!("[Config] Loaded {}", path.display());
        Ok(Some(config))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.agent.executable, "claude");
        assert_eq!(config.agent.plan_timeout_secs, 60);
        assert_eq!(config.queue.idle_timeout_ms, 1000);
        assert_eq!(config.providers.history_window, 20);
        assert_eq!(config.providers.local_url, "http://localhost:8080");
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worktrees_dir_beside_work_dir() {
        let mut config = AppConfig::default();
        config.workspace.work_dir = PathBuf::from("/home/me/dev");
        assert_eq!(config.worktrees_dir(), PathBuf::from("/home/me/.worktrees"));

        config.workspace.worktrees_dir = Some(PathBuf::from("/tmp/wt"));
        assert_eq!(config.worktrees_dir(), PathBuf::from("/tmp/wt"));
    }

    #[test]
    fn test_agent_cli_from_config() {
        let mut config = AppConfig::default();
        config.agent.plan_timeout_secs = 5;
        config.agent.model = Some("opus".to_string());
        let cli = config.agent_cli();
        assert_eq!(cli.plan_timeout, Duration::from_secs(5));
        assert_eq!(cli.model.as_deref(), Some("opus"));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.queue.idle_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.executable = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_handles_missing_config_files_gracefully() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::new()
            .with_global_path(temp.path().join("missing.toml"))
            .with_project_path(temp.path());

        assert!(loader.load_global().unwrap().is_none());
        assert!(loader.load_project().unwrap().is_none());
    }

    #[test]
    fn test_loads_project_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".vox-relay");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            "[agent]\nplan_timeout_secs = 90\n\n[server]\nport = 9100\n",
        )
        .unwrap();

        let loader = ConfigLoader::new().with_project_path(temp.path());
        let partial = loader.load_project().unwrap().unwrap();
        assert_eq!(partial.agent.unwrap().plan_timeout_secs, Some(90));
        assert_eq!(partial.server.unwrap().port, Some(9100));
        assert!(partial.queue.is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[agent\nexecutable = ").unwrap();

        let err = ConfigLoader::new().load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
