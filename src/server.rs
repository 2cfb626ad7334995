//! MCP Server — JSON-RPC 2.0 message handling and the stdio transport.
//!
//! Implements the Model Context Protocol (spec 2025-06-18) server side.
//! [`handle_message`] turns one raw JSON-RPC message into an optional
//! response and is shared by both transports:
//!
//! - stdio: newline-delimited messages on stdin, responses on stdout
//! - HTTP: see [`crate::http`]
//!
//! Protocol flow:
//! 1. Client sends `initialize` → server responds with capabilities
//! 2. Client sends `notifications/initialized`
//! 3. Client sends `tools/list` → server returns tool definitions
//! 4. Client sends `tools/call` → server executes tool and returns result
//! 5. Client closes stdin → server exits (stdio only)

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::tools::ToolRouter;

/// Maximum size of a single JSON-RPC message (10 MiB).
pub(crate) const MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Name reported in `initialize`.
pub const SERVER_NAME: &str = "Shell Tools";

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` only when the member is absent; `"id": null` is `Some(Value::Null)`.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Any `id` member that is present, including `null`, marks a request.
fn present_id<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// MCP protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ServerCapabilities {
    tools: ToolsCapability,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolsCapability {
    list_changed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    capabilities: ServerCapabilities,
    server_info: ServerInfo,
}

/// MCP tool definition for tools/list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolsListResult {
    tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// MCP content item in tools/call response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// MCP tools/call result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// A single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem {
                content_type: "text".to_owned(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    /// A single text item flagged as a protocol-level tool error.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }
}

// ---------------------------------------------------------------------------
// MCP Server configuration
// ---------------------------------------------------------------------------

/// How the server talks to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST on `127.0.0.1:<port>`.
    Http { port: u16 },
}

/// Configuration for the MCP server.
#[derive(Debug, Clone, Default)]
pub struct McpServerConfig {
    pub transport: Transport,
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Run the MCP server on the configured transport until it shuts down.
///
/// # Errors
///
/// Returns an error if the transport fails fatally (stdio I/O, socket bind).
pub fn run_mcp_server(config: McpServerConfig) -> Result<()> {
    let router = ToolRouter::default();
    info!(transport = ?config.transport, "shell-tools MCP server starting");

    match config.transport {
        Transport::Stdio => run_stdio(&router),
        Transport::Http { port } => crate::http::serve_port(router, port),
    }
}

/// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
fn run_stdio(router: &ToolRouter) -> Result<()> {
    let stdin = std::io::stdin();
    let mut reader = std::io::BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout().lock();
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match read_line_limited(&mut reader, &mut line_buf, MAX_MESSAGE_BYTES)
            .context("failed to read from stdin")?
        {
            LineRead::Eof => {
                info!("stdin closed, shutting down");
                break;
            }
            LineRead::Oversized => {
                warn!(max_bytes = MAX_MESSAGE_BYTES, "discarded oversized message");
                let resp = error_response(
                    None,
                    -32600,
                    &format!("invalid request: message exceeds {MAX_MESSAGE_BYTES} bytes"),
                );
                write_response(&mut stdout, &resp)?;
            }
            LineRead::Line => {
                let resp = match std::str::from_utf8(&line_buf) {
                    Ok(line) => handle_message(router, line),
                    Err(e) => {
                        warn!(error = %e, "non-UTF-8 message on stdin");
                        Some(error_response(None, -32700, &format!("parse error: {e}")))
                    }
                };
                if let Some(resp) = resp {
                    write_response(&mut stdout, &resp)?;
                }
            }
        }
    }

    info!("shell-tools MCP server stopped");
    Ok(())
}

/// Handle one raw JSON-RPC message.
///
/// Returns `None` for notifications and blank input, which get no reply.
pub fn handle_message(router: &ToolRouter, raw: &str) -> Option<JsonRpcResponse> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    debug!(raw = trimmed, "received request");

    let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "invalid JSON-RPC request");
            return Some(error_response(None, -32700, &format!("parse error: {e}")));
        }
    };

    // JSON-RPC 2.0 spec: "jsonrpc" MUST be exactly "2.0".
    if request.jsonrpc != "2.0" {
        warn!(
            version = request.jsonrpc,
            "invalid JSON-RPC version (expected \"2.0\")"
        );
        return Some(error_response(
            request.id.clone(),
            -32600,
            &format!(
                "invalid request: jsonrpc version must be \"2.0\", got \"{}\"",
                request.jsonrpc
            ),
        ));
    }

    let response = dispatch(router, &request);

    // Notifications (no id) MUST NOT receive a response; requests always do.
    match &request.id {
        None => {
            debug!(method = request.method, "notification handled (no response)");
            None
        }
        Some(id) => Some(
            response.unwrap_or_else(|| success_response(Some(id.clone()), &serde_json::json!({}))),
        ),
    }
}

/// Dispatch a JSON-RPC request to the appropriate handler.
fn dispatch(router: &ToolRouter, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
    match req.method.as_str() {
        "initialize" => Some(handle_initialize(req)),
        "notifications/initialized" => {
            info!("client initialized");
            None
        }
        "tools/list" => Some(handle_tools_list(router, req)),
        "tools/call" => Some(handle_tools_call(router, req)),
        "ping" => Some(handle_ping(req)),
        _ => {
            warn!(method = req.method, "unknown method");
            Some(error_response(
                req.id.clone(),
                -32601,
                &format!("method not found: {}", req.method),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn handle_initialize(req: &JsonRpcRequest) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_owned(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        },
    };

    success_response(req.id.clone(), &result)
}

fn handle_tools_list(router: &ToolRouter, req: &JsonRpcRequest) -> JsonRpcResponse {
    let tools = router.list_tools();
    let result = ToolsListResult { tools };
    success_response(req.id.clone(), &result)
}

fn handle_tools_call(router: &ToolRouter, req: &JsonRpcRequest) -> JsonRpcResponse {
    let params: ToolCallParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(e) => {
            return error_response(
                req.id.clone(),
                -32602,
                &format!("invalid tools/call params: {e}"),
            );
        }
    };

    match router.call_tool(&params.name, params.arguments) {
        Ok(result) => success_response(req.id.clone(), &result),
        Err(e) => {
            error!(tool = params.name, error = %e, "tool call rejected");
            success_response(req.id.clone(), &ToolCallResult::error(format!("Error: {e}")))
        }
    }
}

fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
    success_response(req.id.clone(), &serde_json::json!({}))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn success_response(id: Option<serde_json::Value>, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(v),
            error: None,
        },
        Err(e) => {
            error!(error = %e, "failed to serialize success response");
            error_response(
                id,
                -32603,
                &format!("internal error: failed to serialize result: {e}"),
            )
        }
    }
}

fn error_response(id: Option<serde_json::Value>, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_owned(),
            data: None,
        }),
    }
}

/// Write a JSON-RPC response as a single line.
fn write_response(out: &mut impl Write, resp: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(resp).context("failed to serialize response")?;
    debug!(response = json, "sending response");
    out.write_all(json.as_bytes())
        .context("failed to write to stdout")?;
    out.write_all(b"\n")
        .context("failed to write newline to stdout")?;
    out.flush().context("failed to flush stdout")?;
    Ok(())
}

/// Result of [`read_line_limited`].
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line,
    /// Line exceeded the limit; it was consumed and discarded.
    Oversized,
}

/// Read a line of raw bytes from `reader` into `buf`, stopping at newline
/// or `max_bytes`.
///
/// Bytes are decoded by the caller once the whole line is in, so a
/// multi-byte character split across buffer refills stays intact. An
/// over-long line is consumed up to its newline and dropped so the next
/// call starts on a fresh message.
fn read_line_limited(
    reader: &mut impl BufRead,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<LineRead> {
    loop {
        let available = reader.fill_buf().context("stdin fill_buf failed")?;
        if available.is_empty() {
            return Ok(if buf.is_empty() { LineRead::Eof } else { LineRead::Line });
        }
        let (consumed, found_newline) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if buf.len() + consumed > max_bytes {
            reader.consume(consumed);
            if !found_newline {
                skip_to_newline(reader)?;
            }
            buf.clear();
            return Ok(LineRead::Oversized);
        }
        buf.extend_from_slice(&available[..consumed]);
        reader.consume(consumed);
        if found_newline {
            return Ok(LineRead::Line);
        }
    }
}

fn skip_to_newline(reader: &mut impl BufRead) -> Result<()> {
    loop {
        let rest = reader.fill_buf().context("stdin fill_buf failed")?;
        if rest.is_empty() {
            return Ok(());
        }
        if let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let eat = rest.len();
        reader.consume(eat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_limited_splits_lines() {
        let mut reader = std::io::Cursor::new(b"{\"a\":1}\n{\"b\":2}".to_vec());
        let mut buf = Vec::new();

        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Line);
        assert_eq!(buf, b"{\"a\":1}\n");

        buf.clear();
        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Line);
        assert_eq!(buf, b"{\"b\":2}");

        buf.clear();
        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Eof);
    }

    #[test]
    fn test_read_line_limited_discards_oversized() {
        let input = format!("{}\nnext\n", "x".repeat(100));
        // Small BufReader capacity forces the multi-chunk skip path.
        let mut reader = std::io::BufReader::with_capacity(16, input.as_bytes());
        let mut buf = Vec::new();

        assert_eq!(
            read_line_limited(&mut reader, &mut buf, 32).expect("read"),
            LineRead::Oversized
        );
        assert!(buf.is_empty());

        assert_eq!(read_line_limited(&mut reader, &mut buf, 32).expect("read"), LineRead::Line);
        assert_eq!(buf, b"next\n");
    }

    #[test]
    fn test_read_line_limited_keeps_split_multibyte_char() {
        // "é" is two bytes and lands across the 16-byte refill boundary.
        let input = "aaaaaaaaaaaaaaaé\n";
        let mut reader = std::io::BufReader::with_capacity(16, input.as_bytes());
        let mut buf = Vec::new();

        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Line);
        assert_eq!(std::str::from_utf8(&buf).expect("valid UTF-8"), input);
    }

    #[test]
    fn test_read_line_limited_passes_invalid_bytes_through() {
        let mut reader = std::io::Cursor::new(b"\xff\xfe\n{}\n".to_vec());
        let mut buf = Vec::new();

        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Line);
        assert!(std::str::from_utf8(&buf).is_err());

        buf.clear();
        assert_eq!(read_line_limited(&mut reader, &mut buf, 64).expect("read"), LineRead::Line);
        assert_eq!(buf, b"{}\n");
    }

    #[test]
    fn test_error_result_sets_flag() {
        let json = serde_json::to_value(ToolCallResult::error("boom")).expect("serialize");
        assert_eq!(json["isError"], serde_json::json!(true));

        let json = serde_json::to_value(ToolCallResult::text("ok")).expect("serialize");
        assert!(json.get("isError").is_none());
    }
}
