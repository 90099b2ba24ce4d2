// Configuration: TOML files layered under CLI/env overrides

pub mod loader;
pub mod merger;

pub use loader::{
    AgentConfig, AppConfig, ConfigLoader, GitConfig, ProvidersConfig, QueueConfig, ServerConfig,
    WorkspaceConfig,
};
pub use merger::{ConfigMerger, PartialConfig};

use anyhow::Result;
use std::path::Path;

/// Load the merged configuration.
///
/// Priority: `cli` → project file in the resolved work dir → global file
/// (or `config_path` when given) → defaults.
pub fn load_merged_config(cli: PartialConfig, config_path: Option<&Path>) -> Result<AppConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_global_path(path);
    }
    let global = loader.load_global()?;

    // The project file lives in the work dir, which the other layers decide
    let work_dir = ConfigMerger::new()
        .with_global(global.clone())
        .with_cli(Some(cli.clone()))
        .merge()
        .workspace
        .work_dir;
    let project = loader.with_project_path(&work_dir).load_project()?;

    let config = ConfigMerger::new()
        .with_global(global)
        .with_project(project)
        .with_cli(Some(cli))
        .merge();
    config.validate()?;

    log::info!(
        "[Config] work_dir={} worktrees_dir={}",
        config.workspace.work_dir.display(),
        config.worktrees_dir().display()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merger::{PartialAgentConfig, PartialWorkspaceConfig};
    use std::fs;
    use tempfile::TempDir;

    fn cli_with_work_dir(dir: &Path) -> PartialConfig {
        PartialConfig {
            workspace: Some(PartialWorkspaceConfig {
                work_dir: Some(dir.to_path_buf()),
                worktrees_dir: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_project_config_read_from_work_dir() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "[agent]\nexecutable = \"global-agent\"\nplan_timeout_secs = 5\n").unwrap();

        let work_dir = temp.path().join("dev");
        fs::create_dir_all(work_dir.join(".vox-relay")).unwrap();
        fs::write(
            work_dir.join(".vox-relay/config.toml"),
            "[agent]\nexecutable = \"project-agent\"\n",
        )
        .unwrap();

        let config = load_merged_config(cli_with_work_dir(&work_dir), Some(&global)).unwrap();
        assert_eq!(config.agent.executable, "project-agent");
        assert_eq!(config.agent.plan_timeout_secs, 5);
        assert_eq!(config.workspace.work_dir, work_dir);
        assert_eq!(config.worktrees_dir(), temp.path().join(".worktrees"));
    }

    #[test]
    fn test_cli_overrides_files() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "[agent]\nexecutable = \"global-agent\"\n").unwrap();

        let mut cli = cli_with_work_dir(temp.path());
        cli.agent = Some(PartialAgentConfig {
            executable: Some("cli-agent".to_string()),
            ..Default::default()
        });

        let config = load_merged_config(cli, Some(&global)).unwrap();
        assert_eq!(config.agent.executable, "cli-agent");
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "[queue]\nidle_timeout_ms = 0\n").unwrap();

        assert!(load_merged_config(cli_with_work_dir(temp.path()), Some(&global)).is_err());
    }
}
