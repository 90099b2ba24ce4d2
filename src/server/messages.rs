//! JSON frames exchanged over the `/ws` socket

use serde::{Deserialize, Serialize};

use crate::agents::AgenticTask;
use crate::ai::HistoryEntry;
use crate::git::{BranchInfo, CreatedWorktree, Worktree};
use crate::queue::{QueueStatus, QueuedTask, TaskRequest};

/// Frames sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    QueueTask {
        container_id: String,
        task: TaskRequest,
    },
    #[serde(rename_all = "camelCase")]
    CancelTask { task_id: String },
    #[serde(rename_all = "camelCase")]
    ClearQueue { container_id: String },
    #[serde(rename_all = "camelCase")]
    QueueStatus { container_id: String },
    #[serde(rename_all = "camelCase")]
    GetTask { task_id: String },
    #[serde(rename_all = "camelCase")]
    AgentPlan {
        container_id: String,
        prompt: String,
        #[serde(default)]
        branch: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AgentConfirm { task_id: String },
    #[serde(rename_all = "camelCase")]
    AgentDeny { task_id: String },
    #[serde(rename_all = "camelCase")]
    AgentChat {
        message: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        branch: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AgentTasks {
        #[serde(default)]
        container_id: Option<String>,
    },
    ListBranches,
    ListWorktrees,
    CreateWorktree { branch: String },
    RemoveWorktree { branch: String },
    CleanupWorktrees,
    #[serde(rename_all = "camelCase")]
    SetHistory {
        container_id: String,
        provider: String,
        history: Vec<HistoryEntry>,
    },
    #[serde(rename_all = "camelCase")]
    ClearSession {
        container_id: String,
        provider: String,
    },
    #[serde(rename_all = "camelCase")]
    ClearContainer { container_id: String },
}

/// Replies and acknowledgements sent to a client.
///
/// Queue and agent notifications are forwarded as their own tagged frames
/// (`task_complete`, `task_error`, `agent_running`, `agent_complete`,
/// `agent_error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    TaskQueued {
        container_id: String,
        task_id: String,
        queue_position: usize,
    },
    #[serde(rename_all = "camelCase")]
    TaskCancelled { task_id: String, cancelled: bool },
    #[serde(rename_all = "camelCase")]
    QueueCleared { container_id: String, removed: usize },
    QueueStatus { status: QueueStatus },
    #[serde(rename_all = "camelCase")]
    Task {
        task_id: String,
        task: Option<QueuedTask>,
    },
    #[serde(rename_all = "camelCase")]
    AgentPlan { task_id: String, plan: String },
    #[serde(rename_all = "camelCase")]
    AgentError { task_id: String, error: String },
    #[serde(rename_all = "camelCase")]
    AgentDenied { task_id: String },
    AgentChat { reply: String },
    AgentTasks { tasks: Vec<AgenticTask> },
    Branches { branches: Vec<BranchInfo> },
    Worktrees { worktrees: Vec<Worktree> },
    WorktreeCreated { worktree: CreatedWorktree },
    WorktreeRemoved { branch: String },
    WorktreesCleaned { removed: usize },
    #[serde(rename_all = "camelCase")]
    HistorySet {
        container_id: String,
        provider: String,
        entries: usize,
    },
    #[serde(rename_all = "camelCase")]
    SessionCleared { container_id: String, removed: usize },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{LocalModelPayload, TaskType};
    use serde_json::json;

    #[test]
    fn test_queue_task_frame_decodes_typed_request() {
        let frame = json!({
            "type": "queue_task",
            "containerId": "c1",
            "task": {
                "taskType": "local-model-request",
                "payload": { "text": "hello" }
            }
        });
        let message: ClientMessage = serde_json::from_value(frame).unwrap();
        match message {
            ClientMessage::QueueTask { container_id, task } => {
                assert_eq!(container_id, "c1");
                assert_eq!(task.task_type(), TaskType::LocalModelRequest);
                assert_eq!(
                    task,
                    TaskRequest::LocalModelRequest(LocalModelPayload {
                        text: "hello".into(),
                        work_dir: None,
                        history: None,
                    })
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_task_type_rejected() {
        let frame = json!({
            "type": "queue_task",
            "containerId": "c1",
            "task": { "taskType": "shell-request", "payload": {} }
        });
        assert!(serde_json::from_value::<ClientMessage>(frame).is_err());
    }

    #[test]
    fn test_unit_frames_decode() {
        let message: ClientMessage =
            serde_json::from_value(json!({ "type": "list_branches" })).unwrap();
        assert_eq!(message, ClientMessage::ListBranches);

        let message: ClientMessage =
            serde_json::from_value(json!({ "type": "agent_plan", "containerId": "c1", "prompt": "fix" }))
                .unwrap();
        assert_eq!(
            message,
            ClientMessage::AgentPlan {
                container_id: "c1".into(),
                prompt: "fix".into(),
                branch: None,
            }
        );
    }

    #[test]
    fn test_outbound_frames_are_tagged_camel_case() {
        let value = serde_json::to_value(ServerMessage::TaskQueued {
            container_id: "c1".into(),
            task_id: "t1".into(),
            queue_position: 2,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({ "type": "task_queued", "containerId": "c1", "taskId": "t1", "queuePosition": 2 })
        );

        let value = serde_json::to_value(ServerMessage::AgentDenied {
            task_id: "t1".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "agent_denied", "taskId": "t1" }));
    }
}
