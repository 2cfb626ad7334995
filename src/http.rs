//! HTTP transport — JSON-RPC over `POST /mcp`.
//!
//! One request per connection (`Connection: close`), one thread per
//! connection. The body is a single JSON-RPC message handed to
//! [`crate::server::handle_message`]; the reply is its JSON response, or
//! `202 Accepted` with no body for notifications.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::server::{MAX_MESSAGE_BYTES, handle_message};
use crate::tools::ToolRouter;

/// Endpoint path for MCP messages.
pub const MCP_PATH: &str = "/mcp";

/// Cap on request line plus headers.
const MAX_HEADER_BYTES: u64 = 64 * 1024;

/// Idle read limit per connection.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Bind `127.0.0.1:<port>` and serve until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub fn serve_port(router: ToolRouter, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .with_context(|| format!("failed to bind 127.0.0.1:{port}"))?;
    serve(listener, router)
}

/// Serve MCP over HTTP on an already-bound listener.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub fn serve(listener: TcpListener, router: ToolRouter) -> Result<()> {
    let addr = listener.local_addr().context("failed to read listener address")?;
    info!(%addr, path = MCP_PATH, "listening for MCP over HTTP");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let router = router.clone();
                std::thread::spawn(move || {
                    if let Err(e) = handle_connection(&router, &stream) {
                        warn!(error = %format!("{e:#}"), "HTTP connection failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to accept connection"),
        }
    }

    Ok(())
}

/// A parsed HTTP request.
#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

/// What to send back.
#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Json(String),
    Status(u16, &'static str),
}

fn handle_connection(router: &ToolRouter, stream: &TcpStream) -> Result<()> {
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("failed to set read timeout")?;

    let mut reader = BufReader::new(stream);
    let reply = match read_request(&mut reader)? {
        Ok(Some(request)) => respond(router, &request),
        Ok(None) => return Ok(()),
        Err(reject) => reject,
    };

    let mut out = stream;
    write_reply(&mut out, &reply)
}

/// Read one request. `Ok(None)` means the peer closed without sending
/// anything; `Err(reply)` is a protocol-level rejection to send back.
fn read_request(reader: &mut impl BufRead) -> Result<std::result::Result<Option<HttpRequest>, Reply>> {
    let mut head = reader.take(MAX_HEADER_BYTES);

    let mut request_line = String::new();
    if head.read_line(&mut request_line).context("failed to read request line")? == 0 {
        return Ok(Ok(None));
    }
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(Err(Reply::Status(400, "Bad Request")));
    };
    let method = method.to_owned();
    let path = target.split('?').next().unwrap_or(target).to_owned();

    let mut content_length = None;
    loop {
        let mut line = String::new();
        if head.read_line(&mut line).context("failed to read header")? == 0 {
            // Headers never terminated (EOF or header cap hit).
            return Ok(Err(Reply::Status(431, "Request Header Fields Too Large")));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                match value.trim().parse::<usize>() {
                    Ok(n) => content_length = Some(n),
                    Err(_) => return Ok(Err(Reply::Status(400, "Bad Request"))),
                }
            }
        }
    }

    let reader = head.into_inner();
    let body = match content_length {
        Some(n) if n > MAX_MESSAGE_BYTES => {
            return Ok(Err(Reply::Status(413, "Payload Too Large")));
        }
        Some(n) => {
            let mut body = vec![0u8; n];
            reader.read_exact(&mut body).context("failed to read request body")?;
            body
        }
        None if method == "POST" => return Ok(Err(Reply::Status(411, "Length Required"))),
        None => Vec::new(),
    };

    Ok(Ok(Some(HttpRequest { method, path, body })))
}

fn respond(router: &ToolRouter, request: &HttpRequest) -> Reply {
    debug!(method = request.method, path = request.path, "HTTP request");

    if request.path != MCP_PATH && request.path != "/mcp/" {
        return Reply::Status(404, "Not Found");
    }
    if request.method != "POST" {
        return Reply::Status(405, "Method Not Allowed");
    }

    let message = String::from_utf8_lossy(&request.body);
    match handle_message(router, &message) {
        Some(response) => match serde_json::to_string(&response) {
            Ok(json) => Reply::Json(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                Reply::Status(500, "Internal Server Error")
            }
        },
        None => Reply::Status(202, "Accepted"),
    }
}

fn write_reply(out: &mut impl Write, reply: &Reply) -> Result<()> {
    let (code, reason, content_type, body) = match reply {
        Reply::Json(json) => (200, "OK", "application/json", json.as_str()),
        Reply::Status(405, reason) => {
            // 405 must advertise what is allowed.
            write!(
                out,
                "HTTP/1.1 405 {reason}\r\nAllow: POST\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            )
            .context("failed to write response")?;
            return out.flush().context("failed to flush response");
        }
        Reply::Status(code, reason) => (*code, *reason, "text/plain", ""),
    };

    write!(
        out,
        "HTTP/1.1 {code} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .context("failed to write response head")?;
    out.write_all(body.as_bytes())
        .context("failed to write response body")?;
    out.flush().context("failed to flush response")?;
    Ok(())
}
