//! `shell-tools` — MCP server exposing shell execution and file patching.
//!
//! Provides a small set of tools over the Model Context Protocol (MCP),
//! either on stdio (JSON-RPC 2.0, newline-delimited) or over HTTP.
//!
//! # Tools
//!
//! - `run_shell_command` — shell execution with timeout or background spawn
//! - `file_read` — raw file text with an optional line window
//! - `file_edit` / `file_replace` — exact-match substring replacement
//! - `file_multi_edit` — ordered exact-match edits with a single final write
//!
//! # Architecture
//!
//! ```text
//! stdin / HTTP POST (JSON-RPC) → server::handle_message → ToolRouter
//!                                                            ├─ exec::CommandRunner
//!                                                            └─ patch::TextPatcher
//! stdout / HTTP reply (JSON-RPC) ←──────────────────────────────┘
//! ```
//!
//! The core components (`exec`, `patch`) are stateless and know nothing
//! about the protocol; the router owns them and renders their results.

pub mod error;
pub mod exec;
pub mod http;
pub mod patch;
pub mod server;
pub mod tools;
pub mod util;

pub use error::{ToolError, ToolResult};
pub use exec::{CommandOutcome, CommandRequest, CommandRunner};
pub use patch::{EditOperation, EditSequence, FileSlice, TextPatcher};
pub use server::run_mcp_server;
