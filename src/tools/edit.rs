//! `file_edit` / `file_replace` — single exact-match replacement.
//!
//! Both tools share parameters and semantics; they differ only in the
//! wording of their result text.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::error::{ToolError, ToolResult};
use crate::patch::{EditOperation, TextPatcher};
use crate::server::{ToolCallResult, ToolDefinition};

pub const NAME: &str = "file_edit";
pub const REPLACE_NAME: &str = "file_replace";

/// Parameters shared by `file_edit` and `file_replace`.
#[derive(Debug, Deserialize)]
pub struct EditParams {
    /// Path to the file to modify.
    pub file_path: String,
    /// The text to find.
    pub old_string: String,
    /// The replacement text.
    pub new_string: String,
    /// Replace all occurrences (default: false, replace first match only).
    #[serde(default)]
    pub replace_all: bool,
}

impl EditParams {
    /// Deserialize and reject an empty `old_string`, which would otherwise
    /// match between every character.
    fn parse(tool: &str, arguments: serde_json::Value) -> ToolResult<Self> {
        let params: Self = super::parse_args(tool, arguments)?;
        if params.old_string.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: tool.to_owned(),
                reason: "old_string must not be empty".to_owned(),
            });
        }
        Ok(params)
    }

    fn operation(&self) -> EditOperation {
        EditOperation::new(&self.old_string, &self.new_string).with_replace_all(self.replace_all)
    }
}

fn input_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "file_path": {
                "type": "string",
                "description": "The absolute path to the file to modify"
            },
            "old_string": {
                "type": "string",
                "description": "The exact text to replace"
            },
            "new_string": {
                "type": "string",
                "description": "The text to replace it with"
            },
            "replace_all": {
                "type": "boolean",
                "description": "Replace all occurrences if true, else only the first occurrence",
                "default": false
            }
        },
        "required": ["file_path", "old_string", "new_string"]
    })
}

/// Return the MCP tool definition for `file_edit`.
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_owned(),
        description: "Edit a file by replacing occurrences of old_string with new_string. \
            Matching is exact (no regex, no whitespace normalization)."
            .to_owned(),
        input_schema: input_schema(),
    }
}

/// Return the MCP tool definition for `file_replace`.
pub fn replace_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: REPLACE_NAME.to_owned(),
        description: "Replace occurrences of old_string with new_string in a file. \
            Matching is exact (no regex, no whitespace normalization)."
            .to_owned(),
        input_schema: input_schema(),
    }
}

/// Execute the `file_edit` tool.
///
/// # Errors
///
/// Returns an error if the arguments don't match the schema or
/// `old_string` is empty.
pub fn execute(patcher: &TextPatcher, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params = EditParams::parse(NAME, arguments)?;
    log_call(NAME, &params);

    let result = patcher
        .edit(Path::new(&params.file_path), &params.operation())
        .map(|summary| format!("Successfully edited {}", summary.path.display()));

    Ok(super::text_result(NAME, result))
}

/// Execute the `file_replace` tool.
///
/// # Errors
///
/// Returns an error if the arguments don't match the schema or
/// `old_string` is empty.
pub fn execute_replace(
    patcher: &TextPatcher,
    arguments: serde_json::Value,
) -> Result<ToolCallResult> {
    let params = EditParams::parse(REPLACE_NAME, arguments)?;
    log_call(REPLACE_NAME, &params);

    let result = patcher
        .replace(Path::new(&params.file_path), &params.operation())
        .map(|summary| format!("Successfully replaced text in {}", summary.path.display()));

    Ok(super::text_result(REPLACE_NAME, result))
}

fn log_call(tool: &str, params: &EditParams) {
    info!(
        tool,
        file_path = %params.file_path,
        old_string = %params.old_string,
        new_string = %params.new_string,
        replace_all = params.replace_all,
        "running edit"
    );
}
