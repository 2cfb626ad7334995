//! Error types for the shell-tools crate.
//!
//! Every variant renders as the human-readable text an agent sees in the
//! tool result, so the `Display` strings are part of the wire contract.

use std::fmt;
use std::path::PathBuf;

/// Which file-rewriting operation failed, for the `EditFailed` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Edit,
    Replace,
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit => f.write_str("edit file"),
            Self::Replace => f.write_str("replace text in file"),
        }
    }
}

/// Tool-level error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Path does not name an existing regular file.
    #[error("File not found: {}. Recheck the path.", path.display())]
    FileNotFound { path: PathBuf },

    /// Command exited with a non-zero status.
    #[error("Command failed: {stderr}")]
    CommandFailed { stderr: String },

    /// Command exceeded its wall-clock deadline and was killed.
    #[error("Command {command} timed out")]
    CommandTimeout { command: String },

    /// I/O failure while reading or rewriting a file during an edit.
    #[error("Failed to {action}: {reason}")]
    EditFailed { action: EditAction, reason: String },

    /// I/O or decoding failure while reading a file slice.
    #[error("Failed to read file: {reason}")]
    ReadFailed { reason: String },

    /// The shell process could not be started at all.
    #[error("Failed to start command {command}: {reason}")]
    SpawnFailed { command: String, reason: String },

    /// Tool arguments did not match the tool's schema.
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// Convenience result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_agent_facing_wording() {
        let err = ToolError::FileNotFound {
            path: PathBuf::from("/tmp/missing.txt"),
        };
        assert_eq!(err.to_string(), "File not found: /tmp/missing.txt. Recheck the path.");

        let err = ToolError::CommandTimeout {
            command: "sleep 5".to_owned(),
        };
        assert_eq!(err.to_string(), "Command sleep 5 timed out");

        let err = ToolError::EditFailed {
            action: EditAction::Replace,
            reason: "permission denied".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to replace text in file: permission denied"
        );
    }
}
