//! shell-tools-mcp -- standalone MCP server for shell and file tools.
//!
//! Usage: shell-tools-mcp [--http] [--port <PORT>]

use clap::Parser;

use shell_tools::server::{McpServerConfig, Transport};

/// Shell Tools MCP server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Run over HTTP instead of stdio.
    #[arg(long)]
    http: bool,

    /// Port for the HTTP server.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr so it does not interfere with MCP stdio.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = if cli.http {
        Transport::Http { port: cli.port }
    } else {
        Transport::Stdio
    };

    shell_tools::run_mcp_server(McpServerConfig { transport })
}
