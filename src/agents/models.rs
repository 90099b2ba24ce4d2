// Agentic task data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an agentic task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgenticTaskStatus {
    Planning,
    PendingApproval,
    Running,
    Completed,
    Failed,
    Denied,
}

impl AgenticTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgenticTaskStatus::Planning => "planning",
            AgenticTaskStatus::PendingApproval => "pending_approval",
            AgenticTaskStatus::Running => "running",
            AgenticTaskStatus::Completed => "completed",
            AgenticTaskStatus::Failed => "failed",
            AgenticTaskStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for AgenticTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgenticTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "planning" => Ok(AgenticTaskStatus::Planning),
            "pending_approval" => Ok(AgenticTaskStatus::PendingApproval),
            "running" => Ok(AgenticTaskStatus::Running),
            "completed" => Ok(AgenticTaskStatus::Completed),
            "failed" => Ok(AgenticTaskStatus::Failed),
            "denied" => Ok(AgenticTaskStatus::Denied),
            _ => Err(format!("Unknown agentic task status: {}", s)),
        }
    }
}

/// A unit of work delegated to the external coding agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgenticTask {
    pub id: String,
    pub prompt: String,
    pub container_id: String,
    pub branch: Option<String>,
    pub status: AgenticTaskStatus,
    pub plan: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgenticTask {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        container_id: impl Into<String>,
        branch: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            prompt: prompt.into(),
            container_id: container_id.into(),
            branch,
            status: AgenticTaskStatus::Planning,
            plan: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Asynchronous notification emitted while a confirmed task executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentNotification {
    #[serde(rename = "agent_running")]
    Running {
        #[serde(rename = "taskId")]
        task_id: String,
    },
    #[serde(rename = "agent_complete")]
    Completed {
        #[serde(rename = "taskId")]
        task_id: String,
        result: String,
    },
    #[serde(rename = "agent_error")]
    Failed {
        #[serde(rename = "taskId")]
        task_id: String,
        error: String,
    },
}

impl AgentNotification {
    pub fn task_id(&self) -> &str {
        match self {
            AgentNotification::Running { task_id }
            | AgentNotification::Completed { task_id, .. }
            | AgentNotification::Failed { task_id, .. } => task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentNotification::Running { .. })
    }
}
