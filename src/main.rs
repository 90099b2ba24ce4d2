use clap::Parser;
use std::path::PathBuf;

use vox_relay_lib::config::merger::{
    PartialConfig, PartialProvidersConfig, PartialServerConfig, PartialWorkspaceConfig,
};
use vox_relay_lib::config::load_merged_config;
use vox_relay_lib::server::{self, ServerAppState};
use vox_relay_lib::shutdown::{register_signal_handlers, ShutdownState};

/// Vox Relay - per-container task queue and agentic coding backend for voice clients
#[derive(Parser, Debug)]
#[command(name = "vox-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to bind the server to
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind the server to
    #[arg(long)]
    bind: Option<String>,

    /// Root of the default (non-worktree) workspace
    #[arg(long, env = "VOX_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Directory under which branch worktrees are created
    #[arg(long, env = "VOX_WORKTREES_DIR")]
    worktrees_dir: Option<PathBuf>,

    /// Config file to use instead of the global one
    #[arg(long, env = "VOX_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the local OpenAI-compatible model server
    #[arg(long, env = "LOCAL_LLM_URL")]
    local_llm_url: Option<String>,
}

impl Cli {
    /// Flags and env vars form the highest-priority config layer
    fn overrides(&self) -> PartialConfig {
        PartialConfig {
            workspace: Some(PartialWorkspaceConfig {
                work_dir: self.work_dir.clone(),
                worktrees_dir: self.worktrees_dir.clone(),
            }),
            providers: Some(PartialProvidersConfig {
                local_url: self.local_llm_url.clone(),
                ..Default::default()
            }),
            server: Some(PartialServerConfig {
                bind: self.bind.clone(),
                port: self.port,
            }),
            ..Default::default()
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::init();

    let config = match load_merged_config(cli.overrides(), cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    rt.block_on(async {
        let shutdown_state = ShutdownState::new();
        if let Err(e) = register_signal_handlers(shutdown_state.clone()) {
            log::warn!("Failed to register signal handlers: {}", e);
        }

        let state = ServerAppState::from_config(config, shutdown_state);
        let sessions = state.sessions.clone();

        if let Err(e) = server::run_server(state).await {
            eprintln!("Server error: {:#}", e);
            std::process::exit(1);
        }

        sessions.clear_everything();
        log::info!("Shutdown complete");
    });
}
