//! Per-container FIFO task scheduler
//!
//! Each container owns a FIFO of task ids and a mutual-exclusion lock. One
//! processor loop per container drains the FIFO, holding the lock for the
//! duration of each handler call; containers never wait on each other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Notify};

use super::handler::TaskHandler;
use super::models::{
    QueueNotification, QueueStatus, QueuedTask, QueuedTaskStatus, RunningTaskSummary, TaskOutput,
    TaskRequest,
};
use crate::agents::ContainerLock;
use crate::utils::{lock_mutex_recover, short_id};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Queue and lock for a single container
struct ContainerQueue {
    pending: VecDeque<String>,
    notify: Arc<Notify>,
    lock: ContainerLock,
    running_task: Option<String>,
    processor_active: bool,
}

impl ContainerQueue {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            notify: Arc::new(Notify::new()),
            lock: Arc::new(tokio::sync::Mutex::new(())),
            running_task: None,
            processor_active: false,
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<String, QueuedTask>,
    containers: HashMap<String, ContainerQueue>,
    replies: HashMap<String, mpsc::UnboundedSender<QueueNotification>>,
}

impl SchedulerState {
    fn container(&mut self, container_id: &str) -> &mut ContainerQueue {
        self.containers
            .entry(container_id.to_string())
            .or_insert_with(ContainerQueue::new)
    }
}

/// Outcome of taking the next item off a container's queue
enum Next {
    Task(String),
    Wait(Arc<Notify>),
}

#[derive(Clone)]
pub struct ContainerTaskScheduler {
    idle_timeout: Duration,
    state: Arc<Mutex<SchedulerState>>,
}

impl Default for ContainerTaskScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl ContainerTaskScheduler {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Append a task to the container's queue. Always succeeds.
    pub fn enqueue(&self, container_id: &str, request: TaskRequest) -> QueuedTask {
        self.push(container_id, request, None)
    }

    /// Like [`Self::enqueue`], delivering the terminal notification to `reply`
    pub fn enqueue_with_reply(
        &self,
        container_id: &str,
        request: TaskRequest,
        reply: mpsc::UnboundedSender<QueueNotification>,
    ) -> QueuedTask {
        self.push(container_id, request, Some(reply))
    }

    fn push(
        &self,
        container_id: &str,
        request: TaskRequest,
        reply: Option<mpsc::UnboundedSender<QueueNotification>>,
    ) -> QueuedTask {
        let task = QueuedTask::new(short_id(), container_id, request);

        let mut state = lock_mutex_recover(&self.state);
        state.tasks.insert(task.id.clone(), task.clone());
        if let Some(reply) = reply {
            state.replies.insert(task.id.clone(), reply);
        }
        let queue = state.container(container_id);
        queue.pending.push_back(task.id.clone());
        queue.notify.notify_one();

        log::info!(
            "[TaskQueue] Queued {} task {} for container {}",
            task.task_type(),
            task.id,
            container_id
        );
        task
    }

    /// 1-based position of a queued task among its container's pending tasks
    pub fn queue_position(&self, task_id: &str) -> Option<usize> {
        let state = lock_mutex_recover(&self.state);
        let task = state.tasks.get(task_id)?;
        if task.status != QueuedTaskStatus::Queued {
            return None;
        }
        let queue = state.containers.get(&task.container_id)?;
        queue
            .pending
            .iter()
            .filter(|id| is_queued(&state.tasks, id))
            .position(|id| id == task_id)
            .map(|p| p + 1)
    }

    /// Start the container's processor unless one is already active.
    ///
    /// Returns whether a new processor was spawned.
    pub fn start_processor(&self, container_id: &str, handler: Arc<dyn TaskHandler>) -> bool {
        {
            let mut state = lock_mutex_recover(&self.state);
            let queue = state.container(container_id);
            if queue.processor_active {
                return false;
            }
            queue.processor_active = true;
        }

        log::debug!("[TaskQueue] Starting processor for container {}", container_id);
        let scheduler = self.clone();
        let container_id = container_id.to_string();
        tokio::spawn(async move {
            scheduler.process(container_id, handler).await;
        });
        true
    }

    /// Cancel a queued task. Running and finished tasks are not affected.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut state = lock_mutex_recover(&self.state);
        let Some(task) = state.tasks.get_mut(task_id) else {
            return false;
        };
        if task.status != QueuedTaskStatus::Queued {
            return false;
        }

        task.status = QueuedTaskStatus::Cancelled;
        task.completed_at = Some(Utc::now());
        let container_id = task.container_id.clone();

        state.replies.remove(task_id);
        if let Some(queue) = state.containers.get_mut(&container_id) {
            queue.pending.retain(|id| id != task_id);
        }

        log::info!("[TaskQueue] Cancelled task {}", task_id);
        true
    }

    /// Cancel every queued task for a container and empty its queue.
    ///
    /// The container lock and any running task are left alone.
    pub fn clear_queue(&self, container_id: &str) -> usize {
        let mut guard = lock_mutex_recover(&self.state);
        let state = &mut *guard;
        let Some(queue) = state.containers.get_mut(container_id) else {
            return 0;
        };
        queue.pending.clear();

        let now = Utc::now();
        let mut cancelled = Vec::new();
        for task in state.tasks.values_mut() {
            if task.container_id == container_id && task.status == QueuedTaskStatus::Queued {
                task.status = QueuedTaskStatus::Cancelled;
                task.completed_at = Some(now);
                cancelled.push(task.id.clone());
            }
        }
        for id in &cancelled {
            state.replies.remove(id);
        }

        log::info!(
            "[TaskQueue] Cleared {} queued tasks for container {}",
            cancelled.len(),
            container_id
        );
        cancelled.len()
    }

    /// Advisory snapshot of a container's queue
    pub fn status(&self, container_id: &str) -> QueueStatus {
        let state = lock_mutex_recover(&self.state);
        let mut status = QueueStatus {
            container_id: container_id.to_string(),
            queued: 0,
            running: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            running_task: None,
        };

        for task in state.tasks.values().filter(|t| t.container_id == container_id) {
            match task.status {
                QueuedTaskStatus::Queued => status.queued += 1,
                QueuedTaskStatus::Completed => status.completed += 1,
                QueuedTaskStatus::Failed => status.failed += 1,
                QueuedTaskStatus::Cancelled => status.cancelled += 1,
                QueuedTaskStatus::Running => {}
            }
        }

        if let Some(running) = state
            .containers
            .get(container_id)
            .and_then(|q| q.running_task.as_ref())
            .and_then(|id| state.tasks.get(id))
        {
            status.running = 1;
            status.running_task = Some(RunningTaskSummary {
                id: running.id.clone(),
                task_type: running.task_type(),
                started_at: running.started_at,
            });
        }

        status
    }

    pub fn get_task(&self, task_id: &str) -> Option<QueuedTask> {
        lock_mutex_recover(&self.state).tasks.get(task_id).cloned()
    }

    /// Queued tasks for a container, in execution order
    pub fn pending_tasks(&self, container_id: &str) -> Vec<QueuedTask> {
        let state = lock_mutex_recover(&self.state);
        let Some(queue) = state.containers.get(container_id) else {
            return Vec::new();
        };
        queue
            .pending
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|t| t.status == QueuedTaskStatus::Queued)
            .cloned()
            .collect()
    }

    /// The task currently executing for a container, if any
    pub fn running_task(&self, container_id: &str) -> Option<QueuedTask> {
        let state = lock_mutex_recover(&self.state);
        state
            .containers
            .get(container_id)
            .and_then(|q| q.running_task.as_ref())
            .and_then(|id| state.tasks.get(id))
            .cloned()
    }

    /// The container's mutual-exclusion lock, shared with agent executions
    pub fn container_lock(&self, container_id: &str) -> ContainerLock {
        lock_mutex_recover(&self.state)
            .container(container_id)
            .lock
            .clone()
    }

    pub fn is_processing(&self, container_id: &str) -> bool {
        lock_mutex_recover(&self.state)
            .containers
            .get(container_id)
            .map_or(false, |q| q.processor_active)
    }

    fn next(&self, container_id: &str) -> Next {
        let mut state = lock_mutex_recover(&self.state);
        let queue = state.container(container_id);
        match queue.pending.pop_front() {
            Some(id) => Next::Task(id),
            None => Next::Wait(queue.notify.clone()),
        }
    }

    /// Mark the processor stopped if the queue is still empty
    fn try_retire(&self, container_id: &str) -> bool {
        let mut state = lock_mutex_recover(&self.state);
        let queue = state.container(container_id);
        if queue.pending.is_empty() {
            queue.processor_active = false;
            true
        } else {
            false
        }
    }

    /// Transition a dequeued task to Running. Returns `None` if it was
    /// cancelled while waiting.
    fn begin(&self, container_id: &str, task_id: &str) -> Option<QueuedTask> {
        let mut guard = lock_mutex_recover(&self.state);
        let state = &mut *guard;
        let task = state.tasks.get_mut(task_id)?;
        if task.status != QueuedTaskStatus::Queued {
            return None;
        }
        task.status = QueuedTaskStatus::Running;
        task.started_at = Some(Utc::now());
        let snapshot = task.clone();
        state.container(container_id).running_task = Some(task_id.to_string());
        Some(snapshot)
    }

    fn finish(&self, container_id: &str, task_id: &str, outcome: Result<TaskOutput, String>) {
        let mut guard = lock_mutex_recover(&self.state);
        let state = &mut *guard;
        state.container(container_id).running_task = None;
        let reply = state.replies.remove(task_id);

        let Some(task) = state.tasks.get_mut(task_id) else {
            return;
        };
        task.completed_at = Some(Utc::now());

        let notification = match outcome {
            Ok(output) => {
                task.status = QueuedTaskStatus::Completed;
                task.result = Some(output.text.clone());
                task.agentic_task_id = output.agentic_task_id.clone();
                log::info!("[TaskQueue] Task {} completed", task_id);
                QueueNotification::Completed {
                    container_id: container_id.to_string(),
                    task_id: task_id.to_string(),
                    result: output.text,
                    agentic_task_id: output.agentic_task_id,
                }
            }
            Err(error) => {
                task.status = QueuedTaskStatus::Failed;
                task.error = Some(error.clone());
                log::warn!("[TaskQueue] Task {} failed: {}", task_id, error);
                QueueNotification::Failed {
                    container_id: container_id.to_string(),
                    task_id: task_id.to_string(),
                    error,
                }
            }
        };

        if let Some(reply) = reply {
            // Originating connection may be gone
            let _ = reply.send(notification);
        }
    }

    async fn process(&self, container_id: String, handler: Arc<dyn TaskHandler>) {
        log::info!("[TaskQueue] Processor started for container {}", container_id);

        loop {
            let task_id = match self.next(&container_id) {
                Next::Task(id) => id,
                Next::Wait(notify) => {
                    if tokio::time::timeout(self.idle_timeout, notify.notified())
                        .await
                        .is_err()
                        && self.try_retire(&container_id)
                    {
                        break;
                    }
                    continue;
                }
            };

            let lock = self.container_lock(&container_id);
            let _guard = lock.lock().await;

            // Cancelled while queued (or while waiting on the lock)
            let Some(task) = self.begin(&container_id, &task_id) else {
                continue;
            };

            log::info!(
                "[TaskQueue] Running {} task {} for container {}",
                task.task_type(),
                task_id,
                container_id
            );

            // Run in a separate task so a panicking handler fails only this task
            let handler = handler.clone();
            let outcome = match tokio::spawn(async move { handler.handle(task).await }).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(join_err) => Err(format!("Task handler panicked: {}", join_err)),
            };

            self.finish(&container_id, &task_id, outcome);
        }

        log::info!("[TaskQueue] Processor exited for container {}", container_id);
    }
}

fn is_queued(tasks: &HashMap<String, QueuedTask>, id: &str) -> bool {
    tasks
        .get(id)
        .map_or(false, |t| t.status == QueuedTaskStatus::Queued)
}
