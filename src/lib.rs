// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::field_reassign_with_default)] // Builder pattern is clearer
#![allow(clippy::redundant_closure)] // |x| f(x) can be clearer than f

// Module declarations
pub mod agents;
pub mod ai;
pub mod config;
pub mod errors;
pub mod git;
pub mod process;
pub mod queue;
pub mod shutdown;
mod utils;

// Server module (HTTP/WebSocket API)
pub mod server;

pub use agents::{AgenticTask, AgenticTaskOrchestrator, AgenticTaskStatus};
pub use ai::{AiProvider, AiSessionRegistry, HistoryEntry};
pub use git::WorktreeResolver;
pub use queue::{ContainerTaskScheduler, QueuedTask, TaskHandler, TaskRequest};
