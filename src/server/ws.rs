//! WebSocket transport for the task queue, agentic tasks and worktrees
//!
//! Each connection gets an outbound frame channel drained by a send task, and
//! a queue reply channel whose notifications are forwarded as frames. Long
//! calls (planning, agent chat, confirmed execution) run in their own tasks so
//! the receive loop keeps reading.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::messages::{ClientMessage, ServerMessage};
use super::ServerAppState;
use crate::agents::AgenticTaskStatus;
use crate::errors::OrchestratorError;
use crate::queue::QueueNotification;

/// Serializes frames onto a connection's outbound channel
#[derive(Clone)]
pub(crate) struct FrameSender(mpsc::UnboundedSender<String>);

impl FrameSender {
    pub(crate) fn send(&self, frame: &impl Serialize) {
        match serde_json::to_string(frame) {
            Ok(json) => {
                // Receiver gone means the socket closed
                let _ = self.0.send(json);
            }
            Err(e) => log::warn!("[Server] Failed to serialize frame: {}", e),
        }
    }
}

/// Per-connection channels
pub(crate) struct Connection {
    frames: FrameSender,
    queue_reply: mpsc::UnboundedSender<QueueNotification>,
    forwarder: JoinHandle<()>,
}

impl Connection {
    /// Open the channels; the returned receiver yields serialized frames
    pub(crate) fn open() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let frames = FrameSender(frame_tx);

        let (queue_reply, mut queue_rx) = mpsc::unbounded_channel::<QueueNotification>();
        let queue_frames = frames.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = queue_rx.recv().await {
                queue_frames.send(&notification);
            }
        });

        (
            Self {
                frames,
                queue_reply,
                forwarder,
            },
            frame_rx,
        )
    }

    fn send(&self, frame: &ServerMessage) {
        self.frames.send(frame);
    }

    /// Handle one decoded client frame
    pub(crate) async fn dispatch(&self, state: &ServerAppState, message: ClientMessage) {
        match message {
            ClientMessage::QueueTask { container_id, task } => {
                let queued =
                    state
                        .scheduler
                        .enqueue_with_reply(&container_id, task, self.queue_reply.clone());
                // Zero when a live processor already picked it up
                let queue_position = state.scheduler.queue_position(&queued.id).unwrap_or(0);
                self.send(&ServerMessage::TaskQueued {
                    container_id: container_id.clone(),
                    task_id: queued.id,
                    queue_position,
                });
                state
                    .scheduler
                    .start_processor(&container_id, state.handler.clone());
            }
            ClientMessage::CancelTask { task_id } => {
                let cancelled = state.scheduler.cancel(&task_id);
                self.send(&ServerMessage::TaskCancelled { task_id, cancelled });
            }
            ClientMessage::ClearQueue { container_id } => {
                let removed = state.scheduler.clear_queue(&container_id);
                self.send(&ServerMessage::QueueCleared {
                    container_id,
                    removed,
                });
            }
            ClientMessage::QueueStatus { container_id } => {
                self.send(&ServerMessage::QueueStatus {
                    status: state.scheduler.status(&container_id),
                });
            }
            ClientMessage::GetTask { task_id } => {
                let task = state.scheduler.get_task(&task_id);
                self.send(&ServerMessage::Task { task_id, task });
            }
            ClientMessage::AgentPlan {
                container_id,
                prompt,
                branch,
            } => {
                let orchestrator = state.orchestrator.clone();
                let frames = self.frames.clone();
                tokio::spawn(async move {
                    let task = orchestrator
                        .start_task(&prompt, &container_id, branch.as_deref())
                        .await;
                    let frame = match task.status {
                        AgenticTaskStatus::PendingApproval => ServerMessage::AgentPlan {
                            task_id: task.id,
                            plan: task.plan.unwrap_or_default(),
                        },
                        _ => ServerMessage::AgentError {
                            task_id: task.id,
                            error: task.error.unwrap_or_default(),
                        },
                    };
                    frames.send(&frame);
                });
            }
            ClientMessage::AgentConfirm { task_id } => {
                let lock = state
                    .orchestrator
                    .get_task(&task_id)
                    .map(|task| state.scheduler.container_lock(&task.container_id));
                match state.orchestrator.confirm(&task_id, lock) {
                    Ok(mut notifications) => {
                        let frames = self.frames.clone();
                        tokio::spawn(async move {
                            while let Some(notification) = notifications.recv().await {
                                frames.send(&notification);
                            }
                        });
                    }
                    Err(e) => self.send(&ServerMessage::AgentError {
                        task_id,
                        error: e.to_string(),
                    }),
                }
            }
            ClientMessage::AgentDeny { task_id } => {
                if state.orchestrator.deny(&task_id) {
                    self.send(&ServerMessage::AgentDenied { task_id });
                } else {
                    let error = match state.orchestrator.get_task(&task_id) {
                        Some(task) => OrchestratorError::InvalidState {
                            task_id: task_id.clone(),
                            actual: task.status,
                        },
                        None => OrchestratorError::NotFound(task_id.clone()),
                    };
                    self.send(&ServerMessage::AgentError {
                        task_id,
                        error: error.to_string(),
                    });
                }
            }
            ClientMessage::AgentChat {
                message,
                context,
                branch,
            } => {
                let orchestrator = state.orchestrator.clone();
                let frames = self.frames.clone();
                tokio::spawn(async move {
                    let reply = orchestrator
                        .chat(&message, context.as_deref(), branch.as_deref())
                        .await;
                    frames.send(&ServerMessage::AgentChat { reply });
                });
            }
            ClientMessage::AgentTasks { container_id } => {
                self.send(&ServerMessage::AgentTasks {
                    tasks: state.orchestrator.list_tasks(container_id.as_deref()),
                });
            }
            ClientMessage::ListBranches => match state.resolver().list_branches().await {
                Ok(branches) => self.send(&ServerMessage::Branches { branches }),
                Err(e) => self.send(&ServerMessage::error(e.to_string())),
            },
            ClientMessage::ListWorktrees => match state.resolver().list_worktrees().await {
                Ok(worktrees) => self.send(&ServerMessage::Worktrees { worktrees }),
                Err(e) => self.send(&ServerMessage::error(e.to_string())),
            },
            ClientMessage::CreateWorktree { branch } => {
                match state.resolver().create_worktree(&branch).await {
                    Ok(worktree) => self.send(&ServerMessage::WorktreeCreated { worktree }),
                    Err(e) => self.send(&ServerMessage::error(e.to_string())),
                }
            }
            ClientMessage::RemoveWorktree { branch } => {
                match state.resolver().remove_worktree(&branch).await {
                    Ok(()) => self.send(&ServerMessage::WorktreeRemoved { branch }),
                    Err(e) => self.send(&ServerMessage::error(e.to_string())),
                }
            }
            ClientMessage::CleanupWorktrees => match state.resolver().cleanup_orphaned().await {
                Ok(removed) => self.send(&ServerMessage::WorktreesCleaned { removed }),
                Err(e) => self.send(&ServerMessage::error(e.to_string())),
            },
            ClientMessage::SetHistory {
                container_id,
                provider,
                history,
            } => match state.sessions.get_or_create(&container_id, &provider, None).await {
                Ok(session) => {
                    let mut session = session.lock().await;
                    session.replace_history(history);
                    self.send(&ServerMessage::HistorySet {
                        container_id,
                        provider,
                        entries: session.history().len(),
                    });
                }
                Err(e) => self.send(&ServerMessage::error(e.to_string())),
            },
            ClientMessage::ClearSession {
                container_id,
                provider,
            } => {
                let removed = usize::from(state.sessions.clear_one(&container_id, &provider));
                self.send(&ServerMessage::SessionCleared {
                    container_id,
                    removed,
                });
            }
            ClientMessage::ClearContainer { container_id } => {
                let removed = state.sessions.clear_all(&container_id);
                self.send(&ServerMessage::SessionCleared {
                    container_id,
                    removed,
                });
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerAppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: ServerAppState) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut frames) = Connection::open();

    log::info!("[Server] WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(json) = frames.recv().await {
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    log::debug!("[Server] Received {:?}", message);
                    connection.dispatch(&state, message).await;
                }
                Err(e) => {
                    log::warn!("[Server] Rejected frame: {}", e);
                    connection.send(&ServerMessage::error(format!("Invalid message: {}", e)));
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("[Server] WebSocket error: {}", e);
                break;
            }
        }
    }

    // Conversations do not outlive the client that held them
    state.sessions.clear_everything();
    drop(connection);
    send_task.abort();
    log::info!("[Server] WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentCli, AgenticTaskOrchestrator};
    use crate::ai::session::tests::EchoProvider;
    use crate::ai::AiSessionRegistry;
    use crate::config::AppConfig;
    use crate::git::WorktreeResolver;
    use crate::queue::ContainerTaskScheduler;
    use crate::shutdown::ShutdownState;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_state(temp: &TempDir) -> ServerAppState {
        let resolver = Arc::new(WorktreeResolver::new(
            temp.path(),
            temp.path().join(".worktrees"),
        ));
        let orchestrator = Arc::new(AgenticTaskOrchestrator::new(
            AgentCli::new("agent-cli-that-does-not-exist"),
            resolver,
        ));
        let sessions = Arc::new(AiSessionRegistry::new(vec![
            EchoProvider::new("local"),
            EchoProvider::new("gemini"),
        ]));
        ServerAppState::new(
            AppConfig::default(),
            ContainerTaskScheduler::new(Duration::from_millis(50)),
            orchestrator,
            sessions,
            ShutdownState::new(),
        )
    }

    async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let json = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("frame channel closed");
        serde_json::from_str(&json).unwrap()
    }

    fn decode(frame: Value) -> ClientMessage {
        serde_json::from_value(frame).unwrap()
    }

    #[tokio::test]
    async fn test_queue_task_acknowledged_then_completed() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                decode(json!({
                    "type": "queue_task",
                    "containerId": "c1",
                    "task": { "taskType": "local-model-request", "payload": { "text": "hi" } }
                })),
            )
            .await;

        let queued = next_frame(&mut frames).await;
        assert_eq!(queued["type"], "task_queued");
        assert_eq!(queued["containerId"], "c1");
        assert_eq!(queued["queuePosition"], 1);

        let complete = next_frame(&mut frames).await;
        assert_eq!(complete["type"], "task_complete");
        assert_eq!(complete["taskId"], queued["taskId"]);
        assert_eq!(complete["result"], "echo: hi");
    }

    #[tokio::test]
    async fn test_plan_failure_reported_as_agent_error() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                decode(json!({ "type": "agent_plan", "containerId": "c1", "prompt": "fix it" })),
            )
            .await;

        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "agent_error");
        assert_eq!(frame["error"], "Agent CLI not found. Is it installed?");

        // Failed tasks can be neither denied nor confirmed
        let task_id = frame["taskId"].as_str().unwrap().to_string();
        connection
            .dispatch(&state, ClientMessage::AgentDeny { task_id: task_id.clone() })
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "agent_error");
        assert_eq!(frame["error"], "Task is not pending approval (status: failed)");

        connection
            .dispatch(&state, ClientMessage::AgentConfirm { task_id })
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "agent_error");
    }

    #[tokio::test]
    async fn test_deny_unknown_task() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                ClientMessage::AgentDeny {
                    task_id: "missing".into(),
                },
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["error"], "Task not found: missing");
    }

    #[tokio::test]
    async fn test_history_and_session_clearing() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                decode(json!({
                    "type": "set_history",
                    "containerId": "c1",
                    "provider": "gemini",
                    "history": [
                        { "role": "user", "content": "hello" },
                        { "role": "assistant", "content": "hi there" }
                    ]
                })),
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "history_set");
        assert_eq!(frame["entries"], 2);

        connection
            .dispatch(
                &state,
                ClientMessage::ClearContainer {
                    container_id: "c1".into(),
                },
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame, json!({ "type": "session_cleared", "containerId": "c1", "removed": 1 }));
        assert_eq!(state.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider_reported_as_error_frame() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                ClientMessage::SetHistory {
                    container_id: "c1".into(),
                    provider: "nope".into(),
                    history: Vec::new(),
                },
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "error");
        assert!(frame["message"]
            .as_str()
            .unwrap()
            .starts_with("Unknown AI provider: nope"));
    }

    #[tokio::test]
    async fn test_queue_status_and_cancel_unknown() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                ClientMessage::CancelTask {
                    task_id: "missing".into(),
                },
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["cancelled"], false);

        connection
            .dispatch(
                &state,
                ClientMessage::QueueStatus {
                    container_id: "idle".into(),
                },
            )
            .await;
        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["type"], "queue_status");
        assert_eq!(frame["status"]["queued"], 0);
        assert_eq!(frame["status"]["running"], 0);
    }

    /// Rejects every task, remembering which containers it was asked to run
    #[derive(Default)]
    struct RejectingHandler {
        containers: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl crate::queue::TaskHandler for RejectingHandler {
        async fn handle(
            &self,
            task: crate::queue::QueuedTask,
        ) -> anyhow::Result<crate::queue::TaskOutput> {
            self.containers.lock().unwrap().push(task.container_id.clone());
            anyhow::bail!("rejected {}", task.request.task_type())
        }
    }

    #[tokio::test]
    async fn test_queue_failure_forwarded_as_task_error() {
        let temp = TempDir::new().unwrap();
        let handler = Arc::new(RejectingHandler::default());
        let state = test_state(&temp).with_handler(handler.clone());
        let (connection, mut frames) = Connection::open();

        connection
            .dispatch(
                &state,
                decode(json!({
                    "type": "queue_task",
                    "containerId": "c7",
                    "task": { "taskType": "local-model-request", "payload": { "text": "hi" } }
                })),
            )
            .await;

        let queued = next_frame(&mut frames).await;
        assert_eq!(queued["type"], "task_queued");

        let failed = next_frame(&mut frames).await;
        assert_eq!(failed["type"], "task_error");
        assert_eq!(failed["taskId"], queued["taskId"]);
        assert_eq!(failed["containerId"], "c7");
        assert!(failed["error"].as_str().unwrap().starts_with("rejected "));
        assert_eq!(*handler.containers.lock().unwrap(), vec!["c7"]);
    }
}
