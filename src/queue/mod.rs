//! Per-container task queue
//!
//! - `scheduler` - `ContainerTaskScheduler`: FIFO queue, lock and processor per container
//! - `handler` - `TaskHandler` trait and the default `DispatchHandler`
//! - `models` - typed task requests, queued task records, status snapshots

pub mod handler;
pub mod models;
pub mod scheduler;

pub use handler::{DispatchHandler, TaskHandler};
pub use models::{
    AgenticMode, AgenticPayload, ChatPayload, LocalModelPayload, QueueNotification, QueueStatus,
    QueuedTask, QueuedTaskStatus, RunningTaskSummary, TaskOutput, TaskRequest, TaskType,
};
pub use scheduler::{ContainerTaskScheduler, DEFAULT_IDLE_TIMEOUT};
