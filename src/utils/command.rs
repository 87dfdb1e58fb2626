//! Utilities for running commands with bounded stderr capture and timeouts

use super::executor::{redirect_open_failed, ExecutionResult, ExitInfo, Invocation};
use crate::error::Result;
use std::fs::File;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error};

/// Upper bound on captured stderr; older output is discarded first
pub const MAX_STDERR_BYTES: usize = 64 * 1024;

/// Grace period for collecting stderr after the child was killed
const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Run an invocation to completion
///
/// Blocks the calling thread on a private current-thread runtime, so it must
/// not be called from within an async context.
pub fn run_invocation(invocation: &Invocation) -> Result<ExecutionResult> {
    let stdin = match invocation.stdin {
        Some(ref path) => Stdio::from(File::open(path).map_err(|e| redirect_open_failed(path, e))?),
        None => Stdio::null(),
    };
    let stdout = match invocation.stdout {
        Some(ref path) => {
            Stdio::from(File::create(path).map_err(|e| redirect_open_failed(path, e))?)
        }
        None => Stdio::null(),
    };

    let mut cmd = tokio::process::Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(&invocation.env)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running command: {}", invocation.display_command());

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return Ok(ExecutionResult {
                status: ExitInfo::SpawnFailed(format!("failed to start async runtime: {}", e)),
                stderr: String::new(),
            })
        }
    };

    let result = runtime.block_on(async {
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult {
                    status: ExitInfo::SpawnFailed(format!("{}: {}", invocation.program, e)),
                    stderr: String::new(),
                }
            }
        };

        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_tail(pipe, MAX_STDERR_BYTES)));

        let status = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited_status(waited),
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill timed out process: {}", e);
                    }
                    ExitInfo::TimedOut(limit)
                }
            },
            None => waited_status(child.wait().await),
        };

        let stderr = match stderr_task {
            Some(task) => match tokio::time::timeout(STDERR_DRAIN_GRACE, task).await {
                Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
                _ => String::new(),
            },
            None => String::new(),
        };

        ExecutionResult { status, stderr }
    });

    if !result.success() {
        error!(
            "Command failed ({}): {}",
            result.status,
            invocation.display_command()
        );
        if !result.stderr.is_empty() {
            error!("Stderr: {}", result.stderr.trim_end());
        }
    }

    Ok(result)
}

fn waited_status(waited: std::io::Result<ExitStatus>) -> ExitInfo {
    match waited {
        Ok(status) => exit_info(status),
        Err(e) => ExitInfo::SpawnFailed(format!("failed to wait for process: {}", e)),
    }
}

fn exit_info(status: ExitStatus) -> ExitInfo {
    if let Some(code) = status.code() {
        return ExitInfo::Exited(code);
    }

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };

    #[cfg(not(unix))]
    let signal = None;

    ExitInfo::Signaled(signal)
}

/// Read a stream to the end, keeping only the last `limit` bytes
async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > limit {
                    let excess = buffer.len() - limit;
                    buffer.drain(..excess);
                }
            }
        }
    }

    buffer
}
