//! Plan → approve → execute lifecycle for agentic tasks
//!
//! Each task is planned by the agent CLI with tools disabled, held until a
//! human confirms or denies the plan, and only then executed with full
//! permissions. Failures are recorded on the task itself; none of the
//! lifecycle calls return process errors to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::agents::commands::{chat_prompt, AgentCli, AgentMode};
use crate::agents::models::{AgentNotification, AgenticTask, AgenticTaskStatus};
use crate::agents::state_machine::transition_state;
use crate::errors::{OrchestratorError, ProcessError};
use crate::git::WorktreeResolver;
use crate::utils::{lock_mutex_recover, short_id, truncate_chars};

type TaskMap = Arc<Mutex<HashMap<String, AgenticTask>>>;

/// Lock shared with the scheduler so confirmed executions serialize per container
pub type ContainerLock = Arc<tokio::sync::Mutex<()>>;

const CHAT_FALLBACK: &str = "I don't have an answer for that right now.";

pub struct AgenticTaskOrchestrator {
    cli: AgentCli,
    resolver: Arc<WorktreeResolver>,
    tasks: TaskMap,
}

impl AgenticTaskOrchestrator {
    pub fn new(cli: AgentCli, resolver: Arc<WorktreeResolver>) -> Self {
        Self {
            cli,
            resolver,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn resolver(&self) -> &Arc<WorktreeResolver> {
        &self.resolver
    }

    /// Create a task and run the planning step.
    ///
    /// Returns the task in `PendingApproval` with its plan, or in `Failed`
    /// with the reason planning (or worktree creation) did not succeed.
    pub async fn start_task(
        &self,
        prompt: &str,
        container_id: &str,
        branch: Option<&str>,
    ) -> AgenticTask {
        let mut task =
            AgenticTask::new(short_id(), prompt, container_id, branch.map(str::to_string));
        self.store(&task);

        log::info!(
            "[Orchestrator] Planning task {} for container {} (branch: {})",
            task.id,
            container_id,
            branch.unwrap_or("-")
        );
        log::debug!("[Orchestrator] Prompt: {}", truncate_chars(prompt, 120));

        if let Some(branch) = branch {
            if let Err(e) = self.resolver.create_worktree(branch).await {
                log::warn!("[Orchestrator] Worktree for '{}' unavailable: {}", branch, e);
                apply_transition(&mut task, AgenticTaskStatus::Failed, |t| {
                    t.error = Some(format!("Failed to create worktree for '{}': {}", branch, e));
                });
                self.store(&task);
                return task;
            }
        }

        let cwd = self.resolver.resolve_path(branch);
        let command = self.cli.command(AgentMode::Plan, prompt, Some(&cwd));

        match command.run_checked().await {
            Ok(output) => {
                let plan = output.stdout.trim().to_string();
                log::info!("[Orchestrator] Task {} awaiting approval", task.id);
                apply_transition(&mut task, AgenticTaskStatus::PendingApproval, |t| {
                    t.plan = Some(plan);
                });
            }
            Err(e) => {
                let message = failure_message(&e, "planning");
                log::warn!("[Orchestrator] Planning failed for {}: {}", task.id, message);
                apply_transition(&mut task, AgenticTaskStatus::Failed, |t| {
                    t.error = Some(message);
                });
            }
        }

        self.store(&task);
        task
    }

    /// Approve a planned task and execute it in the background.
    ///
    /// The returned channel yields an immediate `Running` acknowledgment and
    /// later exactly one terminal notification. Execution has no timeout.
    /// When `container_lock` is given it is held for the whole execution.
    pub fn confirm(
        &self,
        task_id: &str,
        container_lock: Option<ContainerLock>,
    ) -> Result<mpsc::UnboundedReceiver<AgentNotification>, OrchestratorError> {
        let task = {
            let mut tasks = lock_mutex_recover(&self.tasks);
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| OrchestratorError::NotFound(task_id.to_string()))?;

            if task.status != AgenticTaskStatus::PendingApproval {
                return Err(OrchestratorError::InvalidState {
                    task_id: task_id.to_string(),
                    actual: task.status,
                });
            }
            task.status = AgenticTaskStatus::Running;
            task.updated_at = Utc::now();
            task.clone()
        };

        log::info!("[Orchestrator] Task {} confirmed, executing", task.id);

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(AgentNotification::Running {
            task_id: task.id.clone(),
        });

        let cwd = self.resolver.resolve_path(task.branch.as_deref());
        let command = self.cli.command(AgentMode::Execute, &task.prompt, Some(&cwd));
        let tasks = self.tasks.clone();

        tokio::spawn(async move {
            let _guard = match container_lock.as_ref() {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };

            let notification = match command.run_checked().await {
                Ok(output) => {
                    let result = output.stdout.trim().to_string();
                    update_stored(&tasks, &task.id, AgenticTaskStatus::Completed, |t| {
                        t.result = Some(result.clone());
                    });
                    log::info!("[Orchestrator] Task {} completed", task.id);
                    AgentNotification::Completed {
                        task_id: task.id.clone(),
                        result,
                    }
                }
                Err(e) => {
                    let error = failure_message(&e, "execution");
                    update_stored(&tasks, &task.id, AgenticTaskStatus::Failed, |t| {
                        t.error = Some(error.clone());
                    });
                    log::warn!("[Orchestrator] Task {} failed: {}", task.id, error);
                    AgentNotification::Failed {
                        task_id: task.id.clone(),
                        error,
                    }
                }
            };

            // The caller may have stopped listening; the task record is authoritative
            let _ = tx.send(notification);
        });

        Ok(rx)
    }

    /// Deny a planned task. Only `PendingApproval` tasks can be denied.
    pub fn deny(&self, task_id: &str) -> bool {
        let mut tasks = lock_mutex_recover(&self.tasks);
        let Some(task) = tasks.get_mut(task_id) else {
            return false;
        };

        match transition_state(task.status, AgenticTaskStatus::Denied) {
            Ok(status) => {
                task.status = status;
                task.updated_at = Utc::now();
                log::info!("[Orchestrator] Task {} denied", task_id);
                true
            }
            Err(e) => {
                log::debug!("[Orchestrator] Ignoring deny for {}: {}", task_id, e);
                false
            }
        }
    }

    /// Conversational reply from the agent with tools disabled.
    ///
    /// Never fails; errors become an apology the caller can show or speak.
    pub async fn chat(&self, message: &str, context: Option<&str>, branch: Option<&str>) -> String {
        let cwd = self.resolver.resolve_path(branch);
        let prompt = chat_prompt(message, context);
        let command = self.cli.command(AgentMode::Chat, &prompt, Some(&cwd));

        match command.run_checked().await {
            Ok(output) => {
                let reply = output.stdout.trim();
                if reply.is_empty() {
                    CHAT_FALLBACK.to_string()
                } else {
                    reply.to_string()
                }
            }
            Err(e) => {
                log::warn!("[Orchestrator] Chat failed: {}", e);
                apology(&e)
            }
        }
    }

    pub fn get_task(&self, task_id: &str) -> Option<AgenticTask> {
        lock_mutex_recover(&self.tasks).get(task_id).cloned()
    }

    /// All tasks, optionally restricted to one container, oldest first
    pub fn list_tasks(&self, container_id: Option<&str>) -> Vec<AgenticTask> {
        let mut tasks: Vec<AgenticTask> = lock_mutex_recover(&self.tasks)
            .values()
            .filter(|t| container_id.map_or(true, |c| t.container_id == c))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    fn store(&self, task: &AgenticTask) {
        lock_mutex_recover(&self.tasks).insert(task.id.clone(), task.clone());
    }
}

/// Move a task to `target`, applying `update` only if the transition is legal
fn apply_transition(
    task: &mut AgenticTask,
    target: AgenticTaskStatus,
    update: impl FnOnce(&mut AgenticTask),
) -> bool {
    match transition_state(task.status, target) {
        Ok(status) => {
            update(task);
            task.status = status;
            task.updated_at = Utc::now();
            true
        }
        Err(e) => {
            log::warn!("[Orchestrator] Task {}: {}", task.id, e);
            false
        }
    }
}

fn update_stored(
    tasks: &TaskMap,
    task_id: &str,
    target: AgenticTaskStatus,
    update: impl FnOnce(&mut AgenticTask),
) {
    if let Some(task) = lock_mutex_recover(tasks).get_mut(task_id) {
        apply_transition(task, target, update);
    }
}

fn failure_message(err: &ProcessError, phase: &str) -> String {
    match err {
        ProcessError::ExecutableNotFound { .. } => "Agent CLI not found. Is it installed?".to_string(),
        ProcessError::Timeout { .. } => format!("Agent {} timed out", phase),
        ProcessError::NonZeroExit { .. } => err
            .stderr()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Agent {} failed", phase)),
        ProcessError::Io { .. } => err.to_string(),
    }
}

fn apology(err: &ProcessError) -> String {
    match err {
        ProcessError::ExecutableNotFound { .. } => {
            "Sorry, the coding agent isn't installed on this machine.".to_string()
        }
        ProcessError::Timeout { .. } => {
            "Sorry, that took too long. Please try again.".to_string()
        }
        _ => "Sorry, I ran into a problem answering that.".to_string(),
    }
}
