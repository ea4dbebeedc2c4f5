//! External tool command builder and runner.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for an external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Program name or path
    program: String,
    /// Argument list, in order
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a new tool command.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(&self) -> &[String] {
        &self.args
    }
}

/// Captured output of a completed tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    /// The tools here report everything of interest on stderr
    pub stderr: String,
}

/// Runner for tool commands with timeout and cancellation.
pub struct ToolRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run a tool to completion and capture its output.
    ///
    /// A non-zero exit is an error carrying the captured stderr, which is
    /// the only diagnostic surface these tools offer.
    pub async fn run(&self, cmd: &ToolCommand) -> MediaResult<ToolOutput> {
        which::which(cmd.program())
            .map_err(|_| MediaError::tool_not_found(cmd.program()))?;

        debug!("Running {} {}", cmd.program(), cmd.build_args().join(" "));

        let mut child = Command::new(cmd.program())
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        let stdout_handle = tokio::spawn(collect_lines(BufReader::new(stdout)));
        let stderr_handle = tokio::spawn(collect_lines(BufReader::new(stderr)));

        let status = self.wait_for_completion(cmd.program(), &mut child).await?;

        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(ToolOutput {
                exit_code: 0,
                stdout,
                stderr,
            })
        } else {
            Err(MediaError::tool_failed(cmd.program(), status.code(), stderr))
        }
    }

    /// Wait for the child process with optional timeout and cancellation.
    async fn wait_for_completion(
        &self,
        tool: &str,
        child: &mut Child,
    ) -> MediaResult<std::process::ExitStatus> {
        let wait_future = child.wait();

        let wait_result = if let Some(timeout_secs) = self.timeout_secs {
            let timeout =
                tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), wait_future);
            match timeout.await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} timed out after {} seconds, killing process", tool, timeout_secs);
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(timeout_secs));
                }
            }
        } else {
            wait_future.await
        };

        // Classification only; a run already in flight is never aborted
        // mid-stage, its result just goes unused.
        if let Some(ref cancel_rx) = self.cancel_rx {
            if *cancel_rx.borrow() {
                warn!("{} finished after cancellation, discarding result", tool);
                return Err(MediaError::Cancelled);
            }
        }

        Ok(wait_result?)
    }
}

async fn collect_lines<R>(reader: BufReader<R>) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

/// Check if a tool is available.
pub fn check_tool(name: &str) -> MediaResult<PathBuf> {
    which::which(name).map_err(|_| MediaError::tool_not_found(name))
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    check_tool("ffmpeg")
}
