// Agentic coding tasks driven through an external agent CLI

pub mod commands;
pub mod models;
pub mod orchestrator;
pub mod state_machine;

pub use commands::{AgentCli, AgentMode};
pub use models::{AgentNotification, AgenticTask, AgenticTaskStatus};
pub use orchestrator::{AgenticTaskOrchestrator, ContainerLock};
