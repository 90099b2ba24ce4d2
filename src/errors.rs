// Error taxonomy for the orchestration core

use std::time::Duration;
use thiserror::Error;

use crate::agents::AgenticTaskStatus;

/// Failure of an external executable (agent CLI or git)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("{program} not found. Is it installed?")]
    ExecutableNotFound { program: String },

    #[error("{program} timed out after {} seconds", display_secs(.timeout))]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with code {}: {stderr}", display_code(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run {program}: {message}")]
    Io { program: String, message: String },
}

fn display_secs(timeout: &Duration) -> u64 {
    timeout.as_secs()
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

impl ProcessError {
    /// Captured stderr for non-zero exits, if any was written
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ProcessError::NonZeroExit { stderr, .. } if !stderr.trim().is_empty() => {
                Some(stderr.trim())
            }
            _ => None,
        }
    }
}

/// Errors from worktree creation/removal
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorktreeError {
    #[error("Invalid branch name: '{0}'")]
    InvalidBranch(String),

    #[error("Worktree does not exist: {0}")]
    NotFound(String),

    #[error("{}", process_message(.0))]
    Process(#[from] ProcessError),

    #[error("Filesystem error: {0}")]
    Io(String),
}

fn process_message(err: &ProcessError) -> String {
    err.stderr()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

/// Errors from agentic task transitions requested by a caller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task is not pending approval (status: {actual})")]
    InvalidState {
        task_id: String,
        actual: AgenticTaskStatus,
    },
}

/// Errors from conversational providers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Cannot connect to {provider} at {endpoint}. Is it running?")]
    ConnectionFailure { provider: String, endpoint: String },

    #[error("{provider} request failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("{provider} is not configured: {message}")]
    NotConfigured { provider: String, message: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Errors from the session registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown AI provider: {name}. Available: {}", join_names(.available))]
    UnknownProvider { name: String, available: Vec<String> },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}
