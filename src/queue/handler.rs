//! Task handlers invoked by the scheduler's processor loop

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::models::{AgenticMode, AgenticPayload, QueuedTask, TaskOutput, TaskRequest};
use crate::agents::{AgenticTaskOrchestrator, AgenticTaskStatus};
use crate::ai::{AiSessionRegistry, HistoryEntry};

/// Executes one dequeued task. An `Err` marks the task Failed.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: QueuedTask) -> anyhow::Result<TaskOutput>;
}

/// Routes tasks to the orchestrator or the session registry by type
pub struct DispatchHandler {
    orchestrator: Arc<AgenticTaskOrchestrator>,
    sessions: Arc<AiSessionRegistry>,
    default_provider: String,
}

impl DispatchHandler {
    pub fn new(
        orchestrator: Arc<AgenticTaskOrchestrator>,
        sessions: Arc<AiSessionRegistry>,
        default_provider: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            default_provider: default_provider.into(),
        }
    }

    async fn agentic(&self, container_id: &str, payload: AgenticPayload) -> anyhow::Result<TaskOutput> {
        match payload.mode {
            AgenticMode::Chat => {
                let reply = self
                    .orchestrator
                    .chat(
                        &payload.prompt,
                        payload.context.as_deref(),
                        payload.branch.as_deref(),
                    )
                    .await;
                Ok(TaskOutput::from(reply))
            }
            AgenticMode::Plan => {
                let task = self
                    .orchestrator
                    .start_task(&payload.prompt, container_id, payload.branch.as_deref())
                    .await;
                match task.status {
                    AgenticTaskStatus::PendingApproval => Ok(TaskOutput {
                        text: task.plan.unwrap_or_default(),
                        agentic_task_id: Some(task.id),
                    }),
                    _ => Err(anyhow::anyhow!(task
                        .error
                        .unwrap_or_else(|| format!("Agentic task ended in status {}", task.status)))),
                }
            }
        }
    }

    async fn converse(
        &self,
        container_id: &str,
        provider: &str,
        text: &str,
        work_dir: Option<&Path>,
        history: Option<Vec<HistoryEntry>>,
    ) -> anyhow::Result<TaskOutput> {
        let handle = self
            .sessions
            .get_or_create(container_id, provider, work_dir)
            .await?;
        let mut session = handle.lock().await;
        if let Some(history) = history {
            session.replace_history(history);
        }
        let reply = session.respond(text).await?;
        Ok(TaskOutput::from(reply))
    }
}

#[async_trait]
impl TaskHandler for DispatchHandler {
    async fn handle(&self, task: QueuedTask) -> anyhow::Result<TaskOutput> {
        let container_id = task.container_id.as_str();
        match task.request {
            TaskRequest::AgenticRequest(payload) => self.agentic(container_id, payload).await,
            TaskRequest::DirectChatRequest(payload) => {
                let provider = payload
                    .provider
                    .as_deref()
                    .unwrap_or(self.default_provider.as_str());
                self.converse(
                    container_id,
                    provider,
                    &payload.text,
                    payload.work_dir.as_deref(),
                    payload.history,
                )
                .await
            }
            TaskRequest::LocalModelRequest(payload) => {
                self.converse(
                    container_id,
                    "local",
                    &payload.text,
                    payload.work_dir.as_deref(),
                    payload.history,
                )
                .await
            }
        }
    }
}
