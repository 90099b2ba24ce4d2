//! Agent CLI invocations
//!
//! The three ways the core runs the coding agent are declarative variants of
//! one builder rather than separate call sites.

use std::path::Path;
use std::time::Duration;

use crate::process::CommandSpec;

const PLANNING_INSTRUCTIONS: &str = "Describe, step by step, how you would complete the \
following task in this repository. Do not modify any files; only produce the plan.";

/// How the agent is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Print-only, tools disabled, bounded
    Plan,
    /// Full permissions, unbounded
    Execute,
    /// Print-only, tools disabled, single turn, bounded
    Chat,
}

/// Static settings for the agent executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCli {
    pub executable: String,
    pub model: Option<String>,
    pub plan_timeout: Duration,
    pub chat_timeout: Duration,
}

impl Default for AgentCli {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
            model: None,
            plan_timeout: Duration::from_secs(60),
            chat_timeout: Duration::from_secs(60),
        }
    }
}

impl AgentCli {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// Build the command line for `mode`.
    ///
    /// The prompt is always the final positional argument.
    pub fn command(&self, mode: AgentMode, prompt: &str, cwd: Option<&Path>) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.executable.as_str()).arg("--print");

        match mode {
            AgentMode::Plan => {
                cmd = cmd.arg("--tools=").timeout(self.plan_timeout);
            }
            AgentMode::Execute => {
                cmd = cmd.arg("--dangerously-skip-permissions");
            }
            AgentMode::Chat => {
                cmd = cmd
                    .arg("--tools=")
                    .args(["--max-turns", "1"])
                    .timeout(self.chat_timeout);
            }
        }

        if let Some(model) = &self.model {
            cmd = cmd.args(["--model", model.as_str()]);
        }

        if let Some(dir) = cwd {
            cmd = cmd.current_dir(dir);
        }

        let prompt = match mode {
            AgentMode::Plan => planning_prompt(prompt),
            _ => prompt.to_string(),
        };
        cmd.arg(prompt)
    }
}

fn planning_prompt(task: &str) -> String {
    format!("{}\n\nTask: {}", PLANNING_INSTRUCTIONS, task)
}

/// Fold optional caller context into a chat prompt
pub fn chat_prompt(message: &str, context: Option<&str>) -> String {
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("Context:\n{}\n\n{}", context, message),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_command_disables_tools_and_is_bounded() {
        let cli = AgentCli::default();
        let cmd = cli.command(AgentMode::Plan, "fix the bug", Some(Path::new("/work")));

        assert_eq!(cmd.program, "claude");
        assert_eq!(&cmd.args[..2], &["--print", "--tools="]);
        assert!(!cmd.args.iter().any(|a| a == "--dangerously-skip-permissions"));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(60)));
        assert_eq!(cmd.cwd.as_deref(), Some(Path::new("/work")));

        let prompt = cmd.args.last().unwrap();
        assert!(prompt.ends_with("Task: fix the bug"));
    }

    #[test]
    fn test_execute_command_has_no_timeout() {
        let cli = AgentCli::default();
        let cmd = cli.command(AgentMode::Execute, "fix the bug", None);

        assert!(cmd.args.iter().any(|a| a == "--dangerously-skip-permissions"));
        assert!(!cmd.args.iter().any(|a| a == "--tools="));
        assert_eq!(cmd.timeout, None);
        assert_eq!(cmd.args.last().map(String::as_str), Some("fix the bug"));
    }

    #[test]
    fn test_chat_command_single_turn() {
        let cli = AgentCli {
            chat_timeout: Duration::from_secs(15),
            model: Some("sonnet".to_string()),
            ..AgentCli::default()
        };
        let cmd = cli.command(AgentMode::Chat, "hello", None);

        let idx = cmd.args.iter().position(|a| a == "--max-turns").unwrap();
        assert_eq!(cmd.args[idx + 1], "1");
        let idx = cmd.args.iter().position(|a| a == "--model").unwrap();
        assert_eq!(cmd.args[idx + 1], "sonnet");
        assert_eq!(cmd.timeout, Some(Duration::from_secs(15)));
        assert_eq!(cmd.args.last().map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_chat_prompt_with_context() {
        assert_eq!(chat_prompt("hi", None), "hi");
        assert_eq!(chat_prompt("hi", Some("   ")), "hi");
        assert_eq!(chat_prompt("hi", Some("repo: vox")), "Context:\nrepo: vox\n\nhi");
    }
}
