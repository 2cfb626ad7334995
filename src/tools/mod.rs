//! Tool router — registers and dispatches MCP tool calls.
//!
//! Each tool module exposes a `tool_definition()` (name, description, JSON
//! Schema) and an `execute()` that parses arguments and calls into the core.
//! Core failures come back as ordinary text results; only malformed
//! arguments surface as `Err` and get flagged `isError` by the server.

pub mod edit;
pub mod multi_edit;
pub mod read;
pub mod shell;

use std::fmt::Display;

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::exec::CommandRunner;
use crate::patch::TextPatcher;
use crate::server::{ToolCallResult, ToolDefinition};

/// Deserialize tool arguments, naming the tool in the error.
pub(crate) fn parse_args<T: DeserializeOwned>(
    tool: &str,
    arguments: serde_json::Value,
) -> ToolResult<T> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_owned(),
        reason: e.to_string(),
    })
}

/// Render a core result as a single text item.
///
/// Success and failure both travel as plain text; the agent tells them apart
/// by wording, so `is_error` stays false either way.
pub(crate) fn text_result<T: Display>(tool: &str, result: ToolResult<T>) -> ToolCallResult {
    let text = match result {
        Ok(value) => value.to_string(),
        Err(e) => {
            warn!(tool, error = %e, "tool reported failure");
            e.to_string()
        }
    };
    ToolCallResult::text(text)
}

/// Tool router that dispatches MCP tool calls to the core components.
#[derive(Debug, Default, Clone)]
pub struct ToolRouter {
    runner: CommandRunner,
    patcher: TextPatcher,
}

impl ToolRouter {
    pub fn new(runner: CommandRunner, patcher: TextPatcher) -> Self {
        Self { runner, patcher }
    }

    /// List all available tools with their JSON Schema definitions.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            shell::tool_definition(),
            edit::tool_definition(),
            multi_edit::tool_definition(),
            read::tool_definition(),
            edit::replace_tool_definition(),
        ]
    }

    /// Call a tool by name with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error only if the arguments don't match the tool's schema.
    pub fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolCallResult> {
        debug!(tool = name, "dispatching tool call");

        let result = match name {
            shell::NAME => shell::execute(&self.runner, arguments)?,
            edit::NAME => edit::execute(&self.patcher, arguments)?,
            edit::REPLACE_NAME => edit::execute_replace(&self.patcher, arguments)?,
            multi_edit::NAME => multi_edit::execute(&self.patcher, arguments)?,
            read::NAME => read::execute(&self.patcher, arguments)?,
            _ => ToolCallResult::error(format!("Unknown tool: {name}")),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_arguments_name_the_tool() {
        let router = ToolRouter::default();
        let err = router
            .call_tool(edit::NAME, json!({"file_path": "/tmp/x"}))
            .expect_err("missing old_string must be rejected");

        let message = err.to_string();
        assert!(message.contains("file_edit"), "got {message}");
        assert!(message.contains("old_string"), "got {message}");
    }

    #[test]
    fn test_failures_are_plain_text() {
        let result = text_result::<String>(
            "file_read",
            Err(ToolError::FileNotFound {
                path: "/nope".into(),
            }),
        );
        assert!(!result.is_error);
        assert_eq!(result.content[0].text, "File not found: /nope. Recheck the path.");
    }
}
