//! `file_read` — raw text with an optional 0-based line window.

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use crate::patch::{FileSlice, TextPatcher};
use crate::server::{ToolCallResult, ToolDefinition};

pub const NAME: &str = "file_read";

/// Parameters for the read tool.
#[derive(Debug, Deserialize)]
pub struct ReadParams {
    /// Path to the file to read.
    pub file_path: String,
    /// Lines to skip from the start (0-indexed).
    #[serde(default)]
    pub offset: Option<usize>,
    /// Maximum number of lines to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.to_owned(),
        description: "Read a file with optional offset and limit. For large files such as logs, \
            use offset and limit to avoid reading the entire file."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "The absolute path to the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "The line number to start reading from (0-indexed)",
                    "minimum": 0
                },
                "limit": {
                    "type": "integer",
                    "description": "The number of lines to read",
                    "minimum": 0
                }
            },
            "required": ["file_path"]
        }),
    }
}

/// Execute the read tool.
///
/// # Errors
///
/// Returns an error if the arguments don't match the schema.
pub fn execute(patcher: &TextPatcher, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: ReadParams = super::parse_args(NAME, arguments)?;
    info!(
        file_path = %params.file_path,
        offset = params.offset,
        limit = params.limit,
        "running read_file"
    );

    let slice = FileSlice::new(params.file_path)
        .with_offset(params.offset)
        .with_limit(params.limit);

    Ok(super::text_result(NAME, patcher.read(&slice)))
}
