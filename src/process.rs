//! External command execution
//!
//! Every subprocess the core launches (the agent CLI in planning, chat and
//! execution modes, and the git executable) is described declaratively by a
//! [`CommandSpec`] and run through [`CommandSpec::run`]. The spec captures
//! executable, arguments, working directory and an optional timeout, so the
//! call sites only differ in how they build the spec.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::errors::ProcessError;

/// Declarative description of a subprocess invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// `None` means the process may run indefinitely
    pub timeout: Option<Duration>,
}

/// Captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// Run the process to completion and capture its output.
    ///
    /// A non-zero exit is NOT an error here; use [`CommandSpec::run_checked`]
    /// when the caller only cares about success.
    pub async fn run(&self) -> Result<CommandOutput, ProcessError> {
        let program_path = resolve_executable(&self.program)?;

        let mut cmd = Command::new(&program_path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out future drops the child; make sure it dies with it
            .kill_on_drop(true);

        if let Some(dir) = &self.cwd {
            if !dir.is_dir() {
                return Err(ProcessError::Io {
                    program: self.program.clone(),
                    message: format!("working directory {} does not exist", dir.display()),
                });
            }
            cmd.current_dir(dir);
        }

        log::debug!("[Process] Running: {}", self.display());

        // The executable was already resolved, so spawn failures are I/O problems
        let child = cmd.spawn().map_err(|e| ProcessError::Io {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let output = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!(
                        "[Process] {} timed out after {}s",
                        self.program,
                        limit.as_secs()
                    );
                    return Err(ProcessError::Timeout {
                        program: self.program.clone(),
                        timeout: limit,
                    });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| ProcessError::Io {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the process and turn a non-zero exit into [`ProcessError::NonZeroExit`]
    pub async fn run_checked(&self) -> Result<CommandOutput, ProcessError> {
        let output = self.run().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProcessError::NonZeroExit {
                program: self.program.clone(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Resolve an executable name (or path) to something spawnable.
///
/// Bare names are looked up on PATH; explicit paths must exist and be executable.
pub fn resolve_executable(program: &str) -> Result<PathBuf, ProcessError> {
    which::which(program).map_err(|_| ProcessError::ExecutableNotFound {
        program: program.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_args() {
        let spec = CommandSpec::new("git")
            .arg("worktree")
            .args(["list", "--porcelain"])
            .current_dir("/tmp")
            .timeout(Duration::from_secs(5));

        assert_eq!(spec.program, "git");
        assert_eq!(spec.args, vec!["worktree", "list", "--porcelain"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(spec.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_display_quotes_args_with_spaces() {
        let spec = CommandSpec::new("claude").args(["--print", "fix the bug", "--tools="]);
        assert_eq!(spec.display(), "claude --print \"fix the bug\" --tools=");
    }

    #[test]
    fn test_resolve_missing_executable() {
        let result = resolve_executable("this-command-definitely-does-not-exist-12345");
        assert!(matches!(
            result,
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = CommandSpec::new("sh")
            .args(["-c", "echo hello"])
            .run()
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_checked_reports_stderr() {
        let result = CommandSpec::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run_checked()
            .await;

        match result {
            Err(ProcessError::NonZeroExit { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let result = CommandSpec::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100))
            .run()
            .await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_uses_working_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = CommandSpec::new("pwd")
            .current_dir(dir.path())
            .run()
            .await
            .unwrap();
        let reported = PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_working_directory_is_io_error() {
        let result = CommandSpec::new("sh")
            .args(["-c", "echo hi"])
            .current_dir("/definitely/not/a/dir")
            .run()
            .await;

        match result {
            Err(err @ ProcessError::Io { .. }) => {
                assert!(err.to_string().contains("/definitely/not/a/dir"));
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
