//! Worktree resolution and lifecycle
//!
//! Maps logical branch names onto isolated checkouts under a worktrees root,
//! driving the git executable for everything that touches repository state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::{ProcessError, WorktreeError};
use crate::git::porcelain::{parse_local_branches, parse_worktree_list};
use crate::git::types::{BranchInfo, CreatedWorktree, Worktree};
use crate::process::{CommandOutput, CommandSpec};

/// Sanitize a branch name into a filesystem-safe directory token.
///
/// Path separators become dashes; anything outside `[A-Za-z0-9_-]` is dropped.
/// The mapping is not reversible.
pub fn sanitize_branch_name(branch: &str) -> String {
    branch
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect()
}

/// Resolves working directories for containers and manages git worktrees
#[derive(Debug, Clone)]
pub struct WorktreeResolver {
    work_dir: PathBuf,
    worktrees_dir: PathBuf,
    git_executable: String,
}

impl WorktreeResolver {
    pub fn new(work_dir: impl Into<PathBuf>, worktrees_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            worktrees_dir: worktrees_dir.into(),
            git_executable: "git".to_string(),
        }
    }

    pub fn with_git_executable(mut self, git: impl Into<String>) -> Self {
        self.git_executable = git.into();
        self
    }

    /// Default (non-worktree) working directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn worktrees_dir(&self) -> &Path {
        &self.worktrees_dir
    }

    /// Location a branch's worktree would occupy, or `None` if the branch
    /// name sanitizes to nothing.
    pub fn worktree_path(&self, branch: &str) -> Option<PathBuf> {
        let token = sanitize_branch_name(branch);
        if token.is_empty() {
            None
        } else {
            Some(self.worktrees_dir.join(token))
        }
    }

    /// Working directory for an optional branch.
    ///
    /// Falls back to the default directory when no branch is given or its
    /// worktree does not exist on disk.
    pub fn resolve_path(&self, branch: Option<&str>) -> PathBuf {
        match branch.and_then(|b| self.worktree_path(b)) {
            Some(path) if path.exists() => path,
            _ => self.work_dir.clone(),
        }
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(self.git_executable.as_str())
            .args(args)
            .current_dir(&self.work_dir)
    }

    async fn git_checked<I, S>(&self, args: I) -> Result<CommandOutput, WorktreeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.git(args).run_checked().await?)
    }

    /// Create (or reuse) the worktree for `branch`.
    ///
    /// An existing branch is checked out into the new worktree; otherwise a new
    /// branch is created from the current HEAD.
    pub async fn create_worktree(&self, branch: &str) -> Result<CreatedWorktree, WorktreeError> {
        let path = self
            .worktree_path(branch)
            .ok_or_else(|| WorktreeError::InvalidBranch(branch.to_string()))?;

        if path.exists() {
            log::debug!("[Worktree] Reusing existing worktree at {:?}", path);
            return Ok(CreatedWorktree {
                branch: branch.to_string(),
                path,
                existed: true,
            });
        }

        tokio::fs::create_dir_all(&self.worktrees_dir)
            .await
            .map_err(|e| WorktreeError::Io(format!("{}: {}", self.worktrees_dir.display(), e)))?;

        let path_arg = path.to_string_lossy().into_owned();
        if self.branch_exists(branch).await? {
            self.git_checked(["worktree", "add", path_arg.as_str(), branch])
                .await?;
        } else {
            self.git_checked(["worktree", "add", "-b", branch, path_arg.as_str()])
                .await?;
        }

        log::info!("[Worktree] Created worktree for '{}' at {:?}", branch, path);

        Ok(CreatedWorktree {
            branch: branch.to_string(),
            path,
            existed: false,
        })
    }

    /// Force-remove the worktree for `branch`
    pub async fn remove_worktree(&self, branch: &str) -> Result<(), WorktreeError> {
        let path = self
            .worktree_path(branch)
            .filter(|p| p.exists())
            .ok_or_else(|| WorktreeError::NotFound(branch.to_string()))?;

        self.remove_worktree_at(&path).await?;
        log::info!("[Worktree] Removed worktree for '{}'", branch);
        Ok(())
    }

    async fn remove_worktree_at(&self, path: &Path) -> Result<(), WorktreeError> {
        let path_arg = path.to_string_lossy().into_owned();
        self.git_checked(["worktree", "remove", path_arg.as_str(), "--force"])
            .await?;
        Ok(())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, WorktreeError> {
        let reference = format!("refs/heads/{}", branch);
        let output = self
            .git(["rev-parse", "--verify", "--quiet", reference.as_str()])
            .run()
            .await?;
        Ok(output.success())
    }

    /// Name of the branch checked out in the default working directory
    pub async fn current_branch(&self) -> Result<String, WorktreeError> {
        let output = self
            .git_checked(["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn list_worktrees(&self) -> Result<Vec<Worktree>, WorktreeError> {
        let output = self
            .git_checked(["worktree", "list", "--porcelain"])
            .await?;
        Ok(parse_worktree_list(&output.stdout))
    }

    async fn local_branch_names(&self) -> Result<Vec<String>, WorktreeError> {
        let output = self
            .git_checked(["branch", "-a", "--format=%(refname)"])
            .await?;
        Ok(parse_local_branches(&output.stdout))
    }

    /// Local branches, flagged with the current branch and worktree presence
    pub async fn list_branches(&self) -> Result<Vec<BranchInfo>, WorktreeError> {
        let names = self.local_branch_names().await?;
        // A repository without commits has no resolvable HEAD
        let current = self.current_branch().await.ok();
        let with_worktrees: HashSet<String> = self
            .list_worktrees()
            .await?
            .into_iter()
            .filter_map(|wt| wt.branch)
            .collect();

        Ok(names
            .into_iter()
            .map(|name| BranchInfo {
                current: current.as_deref() == Some(name.as_str()),
                has_worktree: with_worktrees.contains(&name),
                name,
            })
            .collect())
    }

    /// Prune stale worktree records, then remove worktree directories whose
    /// name matches no existing branch. Returns the number removed.
    pub async fn cleanup_orphaned(&self) -> Result<usize, WorktreeError> {
        self.git_checked(["worktree", "prune"]).await?;

        let known: HashSet<String> = self
            .local_branch_names()
            .await?
            .iter()
            .map(|b| sanitize_branch_name(b))
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.worktrees_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(WorktreeError::Io(format!(
                    "{}: {}",
                    self.worktrees_dir.display(),
                    e
                )))
            }
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if known.contains(&name) {
                continue;
            }

            match self.remove_worktree_at(&path).await {
                Ok(()) => {
                    log::info!("[Worktree] Removed orphaned worktree {:?}", path);
                    removed += 1;
                }
                Err(e) => {
                    log::warn!("[Worktree] Failed to remove orphaned worktree {:?}: {}", path, e);
                }
            }
        }

        Ok(removed)
    }
}

impl From<std::io::Error> for WorktreeError {
    fn from(e: std::io::Error) -> Self {
        WorktreeError::Io(e.to_string())
    }
}

impl WorktreeError {
    /// Whether the failure came from the git executable being unavailable
    pub fn is_missing_executable(&self) -> bool {
        matches!(
            self,
            WorktreeError::Process(ProcessError::ExecutableNotFound { .. })
        )
    }
}
