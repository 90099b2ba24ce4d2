//! Server application state shared across handlers

use crate::agents::AgenticTaskOrchestrator;
use crate::ai::providers::default_providers;
use crate::ai::AiSessionRegistry;
use crate::config::AppConfig;
use crate::git::WorktreeResolver;
use crate::queue::{ContainerTaskScheduler, DispatchHandler, TaskHandler};
use crate::shutdown::ShutdownState;
use std::sync::Arc;

/// Shared state for the server: the four core components plus the handler
/// the scheduler dispatches queued tasks to.
#[derive(Clone)]
pub struct ServerAppState {
    pub config: Arc<AppConfig>,

    pub scheduler: ContainerTaskScheduler,

    pub orchestrator: Arc<AgenticTaskOrchestrator>,

    pub sessions: Arc<AiSessionRegistry>,

    /// Handler used by every container processor
    pub handler: Arc<dyn TaskHandler>,

    pub shutdown_state: ShutdownState,
}

impl ServerAppState {
    /// Wire up all components from a merged configuration
    pub fn from_config(config: AppConfig, shutdown_state: ShutdownState) -> Self {
        let resolver = Arc::new(
            WorktreeResolver::new(config.workspace.work_dir.clone(), config.worktrees_dir())
                .with_git_executable(config.git.executable.clone()),
        );
        let agent = config.agent_cli();
        let orchestrator = Arc::new(AgenticTaskOrchestrator::new(agent.clone(), resolver));
        let sessions = Arc::new(
            AiSessionRegistry::new(default_providers(&config.providers, &agent))
                .with_history_window(config.providers.history_window),
        );
        let scheduler = ContainerTaskScheduler::new(config.idle_timeout());

        Self::new(config, scheduler, orchestrator, sessions, shutdown_state)
    }

    pub fn new(
        config: AppConfig,
        scheduler: ContainerTaskScheduler,
        orchestrator: Arc<AgenticTaskOrchestrator>,
        sessions: Arc<AiSessionRegistry>,
        shutdown_state: ShutdownState,
    ) -> Self {
        let handler: Arc<dyn TaskHandler> = Arc::new(DispatchHandler::new(
            orchestrator.clone(),
            sessions.clone(),
            config.providers.default_provider.clone(),
        ));
        Self {
            config: Arc::new(config),
            scheduler,
            orchestrator,
            sessions,
            handler,
            shutdown_state,
        }
    }

    /// Replace the handler container processors dispatch to
    pub fn with_handler(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn resolver(&self) -> &Arc<WorktreeResolver> {
        self.orchestrator.resolver()
    }
}
