//! Worktree and branch data structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A git worktree as reported by `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worktree {
    /// Branch checked out in the worktree; `None` when detached or bare
    pub branch: Option<String>,
    pub path: PathBuf,
    pub head: Option<String>,
    pub detached: bool,
}

/// Local branch annotated with worktree information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    pub name: String,
    pub current: bool,
    pub has_worktree: bool,
}

/// Result of [`super::WorktreeResolver::create_worktree`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWorktree {
    pub branch: String,
    pub path: PathBuf,
    /// True when the worktree directory was already present
    pub existed: bool,
}

impl CreatedWorktree {
    pub fn created(&self) -> bool {
        !self.existed
    }
}
