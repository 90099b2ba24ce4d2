// Queued task data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ai::HistoryEntry;

/// Closed set of task kinds the scheduler accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    AgenticRequest,
    DirectChatRequest,
    LocalModelRequest,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::AgenticRequest => "agentic-request",
            TaskType::DirectChatRequest => "direct-chat-request",
            TaskType::LocalModelRequest => "local-model-request",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgenticMode {
    /// Conversational reply, tools disabled
    Chat,
    /// Start a plan that awaits approval
    #[default]
    Plan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgenticPayload {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub mode: AgenticMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    /// Replaces the session history before responding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalModelPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

/// Typed task request, decoded once when the task is enqueued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "taskType", content = "payload", rename_all = "kebab-case")]
pub enum TaskRequest {
    AgenticRequest(AgenticPayload),
    DirectChatRequest(ChatPayload),
    LocalModelRequest(LocalModelPayload),
}

impl TaskRequest {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskRequest::AgenticRequest(_) => TaskType::AgenticRequest,
            TaskRequest::DirectChatRequest(_) => TaskType::DirectChatRequest,
            TaskRequest::LocalModelRequest(_) => TaskType::LocalModelRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedTaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl QueuedTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueuedTaskStatus::Completed | QueuedTaskStatus::Failed | QueuedTaskStatus::Cancelled
        )
    }
}

/// What a handler produced for a completed task
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskOutput {
    pub text: String,
    /// Set when the task started an agentic task awaiting approval
    pub agentic_task_id: Option<String>,
}

impl From<String> for TaskOutput {
    fn from(text: String) -> Self {
        Self {
            text,
            agentic_task_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTask {
    pub id: String,
    pub container_id: String,
    #[serde(flatten)]
    pub request: TaskRequest,
    pub status: QueuedTaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agentic_task_id: Option<String>,
}

impl QueuedTask {
    pub fn new(id: impl Into<String>, container_id: impl Into<String>, request: TaskRequest) -> Self {
        Self {
            id: id.into(),
            container_id: container_id.into(),
            request,
            status: QueuedTaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            agentic_task_id: None,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.request.task_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTaskSummary {
    pub id: String,
    pub task_type: TaskType,
    pub started_at: Option<DateTime<Utc>>,
}

/// Point-in-time snapshot of one container's queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub container_id: String,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub running_task: Option<RunningTaskSummary>,
}

/// Terminal notification delivered to the channel that enqueued a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum QueueNotification {
    #[serde(rename = "task_complete", rename_all = "camelCase")]
    Completed {
        container_id: String,
        task_id: String,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agentic_task_id: Option<String>,
    },
    #[serde(rename = "task_error", rename_all = "camelCase")]
    Failed {
        container_id: String,
        task_id: String,
        error: String,
    },
}

impl QueueNotification {
    pub fn task_id(&self) -> &str {
        match self {
            QueueNotification::Completed { task_id, .. }
            | QueueNotification::Failed { task_id, .. } => task_id,
        }
    }

    pub fn container_id(&self) -> &str {
        match self {
            QueueNotification::Completed { container_id, .. }
            | QueueNotification::Failed { container_id, .. } => container_id,
        }
    }
}
