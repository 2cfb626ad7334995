//! Supervised shell command execution.
//!
//! Commands always go through a shell (`sh -c` / `cmd /C`), so pipes, globs
//! and `&&` chains behave as typed. Quoting and injection are the caller's
//! concern.
//!
//! Every child is started in its own process group. On timeout the whole
//! group is killed, which takes down anything the shell forked as well.
//! Background children are detached: their pid is returned and a reaper
//! thread collects the exit status so no zombie lingers.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ToolError, ToolResult};

/// Default foreground timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// How often the foreground wait loop polls the child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Shell-interpreted command text.
    pub command: String,
    /// Working directory; the server's own cwd when `None`.
    pub cwd: Option<PathBuf>,
    /// Wall-clock limit for foreground runs. Ignored in background mode.
    pub timeout: Duration,
    /// Spawn detached and return the pid immediately.
    pub background: bool,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            background: false,
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

/// Successful result of [`CommandRunner::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Foreground run exited 0; stdout with trailing whitespace trimmed.
    Output(String),
    /// Background run was spawned.
    Background { pid: u32 },
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(stdout) => f.write_str(stdout),
            Self::Background { pid } => {
                write!(f, "Process started in background with PID {pid}")
            }
        }
    }
}

/// Stateless command runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `request` in the foreground (with timeout) or background.
    ///
    /// # Errors
    ///
    /// - [`ToolError::CommandFailed`] on non-zero exit, carrying stderr
    /// - [`ToolError::CommandTimeout`] when the deadline passes (the process
    ///   group is killed first)
    /// - [`ToolError::SpawnFailed`] if the shell could not be started
    pub fn execute(&self, request: &CommandRequest) -> ToolResult<CommandOutcome> {
        let cwd = request
            .cwd
            .as_ref()
            .map_or_else(|| "<current dir>".to_owned(), |p| p.display().to_string());
        info!(
            command = %request.command,
            cwd = %cwd,
            timeout_secs = request.timeout.as_secs(),
            background = request.background,
            "running shell command"
        );

        if request.background {
            spawn_background(request)
        } else {
            run_foreground(request)
        }
    }
}

/// Build the shell invocation, placed in a fresh process group.
fn shell_command(request: &CommandRequest) -> Command {
    #[cfg(unix)]
    let mut cmd = {
        use std::os::unix::process::CommandExt;

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&request.command).process_group(0);
        cmd
    };

    #[cfg(windows)]
    let mut cmd = {
        use std::os::windows::process::CommandExt;

        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        let mut cmd = Command::new("cmd");
        cmd.arg("/C")
            .arg(&request.command)
            .creation_flags(CREATE_NEW_PROCESS_GROUP);
        cmd
    };

    if let Some(cwd) = &request.cwd {
        cmd.current_dir(cwd);
    }
    // Never hand the child our stdin: on the stdio transport it carries the protocol stream.
    cmd.stdin(Stdio::null());
    cmd
}

fn spawn_failed(request: &CommandRequest, err: &std::io::Error) -> ToolError {
    ToolError::SpawnFailed {
        command: request.command.clone(),
        reason: err.to_string(),
    }
}

fn run_foreground(request: &CommandRequest) -> ToolResult<CommandOutcome> {
    let mut child = shell_command(request)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_failed(request, &e))?;

    // Drain both pipes concurrently so a chatty child can't fill a pipe
    // buffer and block forever before we get to read it.
    let stdout_rx = spawn_reader(child.stdout.take());
    let stderr_rx = spawn_reader(child.stderr.take());

    // A timeout too large to represent as an Instant means no deadline.
    let deadline = Instant::now().checked_add(request.timeout);
    let timed_out = |child: &mut Child| {
        kill_process_group(child);
        warn!(
            command = %request.command,
            timeout_secs = request.timeout.as_secs(),
            "command timed out, process group killed"
        );
        ToolError::CommandTimeout {
            command: request.command.clone(),
        }
    };

    // Poll with short sleeps until process exits or timeout.
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                let now = Instant::now();
                let pause = match deadline {
                    Some(deadline) if now >= deadline => return Err(timed_out(&mut child)),
                    Some(deadline) => POLL_INTERVAL.min(deadline - now),
                    None => POLL_INTERVAL,
                };
                std::thread::sleep(pause);
            }
            Err(e) => {
                kill_process_group(&mut child);
                return Err(ToolError::CommandFailed {
                    stderr: format!("failed to check process status: {e}"),
                });
            }
        }
    };

    // The shell is gone, but anything it backgrounded may still hold the
    // pipes open. Those share the deadline.
    let (Some(stdout), Some(stderr)) = (
        collect_until(&stdout_rx, deadline),
        collect_until(&stderr_rx, deadline),
    ) else {
        return Err(timed_out(&mut child));
    };

    debug!(
        command = %request.command,
        exit_code = status.code(),
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        "command finished"
    );

    if status.success() {
        Ok(CommandOutcome::Output(stdout.trim_end().to_owned()))
    } else {
        Err(ToolError::CommandFailed {
            stderr: stderr.trim().to_owned(),
        })
    }
}

fn spawn_background(request: &CommandRequest) -> ToolResult<CommandOutcome> {
    let mut child = shell_command(request)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_failed(request, &e))?;

    let pid = child.id();
    let reaper = std::thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => debug!(pid, exit_code = status.code(), "background process exited"),
            Err(e) => warn!(pid, error = %e, "failed to wait on background process"),
        });
    if let Err(e) = reaper {
        warn!(pid, error = %e, "failed to start reaper thread");
    }

    info!(pid, command = %request.command, "background process started");
    Ok(CommandOutcome::Background { pid })
}

/// Read a pipe to EOF on its own thread, delivering the bytes over a channel.
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(buf);
            });
        }
        None => {
            let _ = tx.send(Vec::new());
        }
    }
    rx
}

/// Wait for a reader's bytes until `deadline` (forever if `None`).
/// Returns `None` when the deadline passed first.
fn collect_until(rx: &mpsc::Receiver<Vec<u8>>, deadline: Option<Instant>) -> Option<String> {
    let received = match deadline {
        Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        // Reader thread died without sending; treat as empty output.
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}

/// Kill the child's whole process group, then reap the child.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let pgid = child.id();
    let signalled = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success());

    if !signalled {
        warn!(pgid, "group kill failed, killing shell process only");
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(windows)]
fn kill_process_group(child: &mut Child) {
    let pid = child.id();
    let signalled = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success());

    if !signalled {
        let _ = child.kill();
    }
    let _ = child.wait();
}
