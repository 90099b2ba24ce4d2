//! Git worktree resolution
//!
//! - `worktrees` - `WorktreeResolver`: branch → working directory mapping and worktree lifecycle
//! - `porcelain` - parsers for git's machine-readable output
//! - `types` - shared data structures

mod porcelain;
mod types;
mod worktrees;

pub use porcelain::{parse_local_branches, parse_worktree_list};
pub use types::{BranchInfo, CreatedWorktree, Worktree};
pub use worktrees::{sanitize_branch_name, WorktreeResolver};
