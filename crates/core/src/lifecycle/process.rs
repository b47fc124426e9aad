//! Subprocess handles with incremental output and bounded termination.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cancel::{CancelHandle, Stoppable};

/// How long `terminate` waits for a killed child to be reaped.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(3);

/// Errors from starting or supervising a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be found.
    #[error("executable not found: {program}")]
    NotFound { program: PathBuf },

    /// Spawning failed for another reason.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its time budget and was killed.
    #[error("process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The owning task was cancelled and the process killed.
    #[error("process cancelled")]
    Cancelled,
}

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub success: bool,
    /// Ended because of `terminate`.
    pub killed: bool,
}

impl ExitInfo {
    fn unknown() -> Self {
        Self {
            code: None,
            success: false,
            killed: false,
        }
    }
}

/// Merged stdout/stderr of a process, one line at a time.
///
/// Lines are split on `\n` and `\r` so that progress bars redrawn in place
/// still arrive as they are produced. Consumed once.
pub struct ProcessOutput {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ProcessOutput {
    /// Next line, or `None` once both streams are closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Stream for ProcessOutput {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}

/// A running (or finished) subprocess.
///
/// A supervisor task owns the child. The handle can be shared (`Arc`) between
/// the task reading output and whoever needs to kill it.
pub struct ProcessHandle {
    program: PathBuf,
    pid: Option<u32>,
    kill: CancellationToken,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    output: Mutex<Option<ProcessOutput>>,
    grace: Duration,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .finish()
    }
}

impl ProcessHandle {
    /// Spawn the command. Must be called from within a Tokio runtime.
    pub fn start(spec: &CommandSpec, grace: Duration) -> Result<Self, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                ProcessError::Spawn {
                    program: spec.program.clone(),
                    source: e,
                }
            }
        })?;

        let pid = child.id();
        debug!(pid = ?pid, "Started {}", spec.display());

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_lines(stderr, line_tx));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let kill = CancellationToken::new();
        tokio::spawn(supervise(child, kill.clone(), exit_tx, grace));

        Ok(Self {
            program: spec.program.clone(),
            pid,
            kill,
            exit_rx,
            output: Mutex::new(Some(ProcessOutput { rx: line_rx })),
            grace,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Take the output stream. Returns `None` on every call after the first.
    pub fn take_output(&self) -> Option<ProcessOutput> {
        self.output.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Exit info if the process has already finished.
    pub fn try_exit(&self) -> Option<ExitInfo> {
        self.exit_rx.borrow().clone()
    }

    /// Wait for the process to end on its own (or through `terminate`).
    pub async fn wait(&self) -> ExitInfo {
        wait_exit(self.exit_rx.clone())
            .await
            .unwrap_or_else(ExitInfo::unknown)
    }

    /// Kill the process and wait at most the grace period for it to be reaped.
    ///
    /// Idempotent; returns immediately with the recorded exit for a process
    /// that already finished.
    pub async fn terminate(&self) -> Option<ExitInfo> {
        if let Some(info) = self.try_exit() {
            return Some(info);
        }
        self.kill.cancel();
        let bound = self.grace + Duration::from_millis(100);
        match timeout(bound, wait_exit(self.exit_rx.clone())).await {
            Ok(info) => info,
            Err(_) => {
                warn!(pid = ?self.pid, "Process not reaped within grace period");
                None
            }
        }
    }
}

#[async_trait]
impl Stoppable for ProcessHandle {
    fn describe(&self) -> String {
        match self.pid {
            Some(pid) => format!("process {} (pid {})", self.program.display(), pid),
            None => format!("process {}", self.program.display()),
        }
    }

    async fn stop(&self) {
        self.terminate().await;
    }
}

async fn wait_exit(mut rx: watch::Receiver<Option<ExitInfo>>) -> Option<ExitInfo> {
    let result = match rx.wait_for(|v| v.is_some()).await {
        Ok(info) => info.clone(),
        Err(_) => None,
    };
    result
}

async fn supervise(
    mut child: Child,
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    grace: Duration,
) {
    let info = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => ExitInfo {
                code: status.code(),
                success: status.success(),
                killed: false,
            },
            Err(e) => {
                warn!("Failed to wait for child: {}", e);
                ExitInfo::unknown()
            }
        },
        _ = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                debug!("Kill failed (already exited?): {}", e);
            }
            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => ExitInfo {
                    code: status.code(),
                    success: false,
                    killed: true,
                },
                _ => ExitInfo {
                    code: None,
                    success: false,
                    killed: true,
                },
            }
        }
    };
    let _ = exit_tx.send(Some(info));
}

async fn pump_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                break;
            }
        };
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &tx);
            } else {
                pending.push(byte);
            }
        }
    }
    flush_line(&mut pending, &tx);
}

fn flush_line(pending: &mut Vec<u8>, tx: &mpsc::UnboundedSender<String>) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending).to_string();
    pending.clear();
    // receiver gone means nobody is listening; keep draining the pipe anyway
    let _ = tx.send(line);
}

/// Everything a short-lived process printed, plus how it ended.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub lines: Vec<String>,
    pub exit: ExitInfo,
}

/// Run a command to completion, registered with `cancel` for the duration.
///
/// Cancellation and the time budget both kill the process.
pub async fn run_captured(
    spec: &CommandSpec,
    cancel: &CancelHandle,
    time_budget: Duration,
    grace: Duration,
) -> Result<CapturedOutput, ProcessError> {
    if cancel.is_cancelled() {
        return Err(ProcessError::Cancelled);
    }

    let handle = Arc::new(ProcessHandle::start(spec, grace)?);
    let _guard = cancel.register(handle.clone());
    let mut output = handle
        .take_output()
        .ok_or(ProcessError::Cancelled)?;

    let collect = async {
        let mut lines = Vec::new();
        while let Some(line) = output.next_line().await {
            lines.push(line);
        }
        let exit = handle.wait().await;
        CapturedOutput { lines, exit }
    };

    tokio::select! {
        captured = timeout(time_budget, collect) => match captured {
            Ok(captured) if captured.exit.killed && cancel.is_cancelled() => {
                Err(ProcessError::Cancelled)
            }
            Ok(captured) => Ok(captured),
            Err(_) => {
                handle.terminate().await;
                Err(ProcessError::Timeout {
                    timeout_secs: time_budget.as_secs(),
                })
            }
        },
        _ = cancel.cancelled() => {
            handle.terminate().await;
            Err(ProcessError::Cancelled)
        }
    }
}
