//! `run_shell_command` — shell execution with timeout or background spawn.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::exec::{CommandRequest, CommandRunner, DEFAULT_TIMEOUT_SECS};
use crate::server::{ToolCallResult, ToolDefinition};

pub const NAME: &str = "run_shell_command";

#[derive(Debug, Deserialize)]
pub struct ShellParams {
    /// The shell command to run.
    pub command: String,
    /// Working directory (default: the server's current directory).
    #[serde(default)]
    pub cwd: Option<String>,
    /// Timeout in seconds for foreground runs.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Spawn detached and return the PID.
    #[serde(default)]
    pub run_in_bg: bool,
}

const fn default_timeout() -> u64 { DEFAULT_TIMEOUT_SECS }

impl From<ShellParams> for CommandRequest {
    fn from(params: ShellParams) -> Self {
        CommandRequest::new(params.command)
            .with_cwd(params.cwd.map(PathBuf::from))
            .with_timeout(Duration::from_secs(params.timeout))
            .with_background(params.run_in_bg)
    }
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_owned(),
        description: "Run a shell command and return its output. Foreground commands are \
            killed (with their whole process group) when the timeout expires. With run_in_bg \
            the command is detached and its PID is returned immediately."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                },
                "cwd": {
                    "type": "string",
                    "description": "The working directory to run the command in"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout for the command in seconds (default: 60)",
                    "default": DEFAULT_TIMEOUT_SECS,
                    "minimum": 0
                },
                "run_in_bg": {
                    "type": "boolean",
                    "description": "If true, runs the command in the background",
                    "default": false
                }
            },
            "required": ["command"]
        }),
    }
}

/// Execute the `run_shell_command` tool.
///
/// # Errors
///
/// Returns an error if the arguments don't match the schema.
pub fn execute(runner: &CommandRunner, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: ShellParams = super::parse_args(NAME, arguments)?;
    let request = CommandRequest::from(params);

    Ok(super::text_result(NAME, runner.execute(&request)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let params: ShellParams =
            serde_json::from_value(json!({"command": "ls"})).expect("parse");
        let request = CommandRequest::from(params);

        assert_eq!(request.timeout, Duration::from_secs(60));
        assert!(!request.background);
        assert!(request.cwd.is_none());
    }

    #[test]
    fn test_failure_text() {
        let result = execute(&CommandRunner::new(), json!({"command": "echo bad >&2; false"}))
            .expect("valid arguments");
        assert_eq!(result.content[0].text, "Command failed: bad");
    }

    #[test]
    fn test_timeout_text() {
        let result = execute(
            &CommandRunner::new(),
            json!({"command": "sleep 3", "timeout": 0}),
        )
        .expect("valid arguments");
        assert_eq!(result.content[0].text, "Command sleep 3 timed out");
    }
}
