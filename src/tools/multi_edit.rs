//! `file_multi_edit` — ordered edits, one write.

use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::patch::{EditSequence, TextPatcher};
use crate::server::{ToolCallResult, ToolDefinition};

pub const NAME: &str = "file_multi_edit";

#[derive(Debug, Deserialize)]
pub struct MultiEditParams {
    /// Path to the file to modify.
    pub file_path: String,
    /// Raw edit entries; malformed ones are skipped, not rejected.
    pub edits: Vec<serde_json::Value>,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_owned(),
        description: "Edit a file by applying multiple edit operations in order. Each edit sees \
            the result of the previous one and the file is written once at the end. Entries \
            missing old_string or new_string are skipped."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The absolute path to the file to modify"
                },
                "edits": {
                    "type": "array",
                    "description": "Edit operations, applied in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "old_string": { "type": "string" },
                            "new_string": { "type": "string" },
                            "replace_all": { "type": "boolean", "default": false }
                        }
                    }
                }
            },
            "required": ["file_path", "edits"]
        }),
    }
}

/// Execute the `file_multi_edit` tool.
///
/// # Errors
///
/// Returns an error if the arguments don't match the schema.
pub fn execute(patcher: &TextPatcher, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: MultiEditParams = super::parse_args(NAME, arguments)?;
    info!(
        file_path = %params.file_path,
        edits = %serde_json::Value::Array(params.edits.clone()),
        "running multi_edit"
    );

    let sequence = EditSequence::from_values(&params.edits);
    let result = patcher
        .multi_edit(Path::new(&params.file_path), &sequence)
        .map(|summary| {
            format!("Successfully applied multiple edits to {}", summary.path.display())
        });

    Ok(super::text_result(NAME, result))
}
