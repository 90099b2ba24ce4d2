//! Parser for `git worktree list --porcelain`

use std::path::PathBuf;

use super::types::Worktree;

const BRANCH_PREFIX: &str = "refs/heads/";

/// Parse porcelain output into worktrees.
///
/// Records are separated by blank lines. Unknown attribute lines
/// (`locked`, `prunable`, ...) are ignored.
pub fn parse_worktree_list(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut current: Option<Worktree> = None;

    for line in output.lines() {
        let line = line.trim_end();

        if line.is_empty() {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(wt) = current.take() {
                worktrees.push(wt);
            }
            current = Some(Worktree {
                branch: None,
                path: PathBuf::from(path),
                head: None,
                detached: false,
            });
            continue;
        }

        let Some(wt) = current.as_mut() else {
            continue;
        };

        if let Some(head) = line.strip_prefix("HEAD ") {
            wt.head = Some(head.to_string());
        } else if let Some(reference) = line.strip_prefix("branch ") {
            let name = reference.strip_prefix(BRANCH_PREFIX).unwrap_or(reference);
            wt.branch = Some(name.to_string());
        } else if line == "detached" {
            wt.detached = true;
        }
    }

    if let Some(wt) = current {
        worktrees.push(wt);
    }

    worktrees
}

/// Extract local branch names from `git branch -a --format=%(refname)`.
///
/// Remote-tracking refs are skipped.
pub fn parse_local_branches(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(name) = line.trim().strip_prefix(BRANCH_PREFIX) else {
            continue;
        };
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}
