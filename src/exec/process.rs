// src/exec/process.rs

//! Spawning the test tool in its own process group and tearing that group
//! down on exit, cancellation or deadline.
//!
//! Every spawned child leads a fresh group, so killing the group also
//! reaches the test binaries the tool forks. Termination is idempotent:
//! calling it on an exited or already-killed process is harmless.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::errors::{Result, SentinelError};

use super::platform::{PlatformGroup, ProcessGroup};

/// How long a killed process gets to be reaped before we stop waiting.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long output collection may take once the process has exited.
pub const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Everything needed to launch one subprocess.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub working_dir: Option<&'a Path>,
    pub env: &'a BTreeMap<String, String>,
}

/// Combined output and exit status of a process that ran to completion.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Standard output followed by standard error, lossily decoded.
    pub output: String,
}

/// A running (or finished) child process that leads its own group.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    program: String,
    exited: bool,
}

/// Start `req.program` as the leader of a new process group.
pub fn spawn(req: SpawnRequest<'_>) -> Result<ProcessHandle> {
    let mut cmd = Command::new(req.program);
    cmd.args(req.args)
        .envs(req.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = req.working_dir {
        cmd.current_dir(dir);
    }
    PlatformGroup::configure(&mut cmd);

    let child = cmd.spawn().map_err(|source| SentinelError::Launch {
        program: req.program.to_string(),
        source,
    })?;
    let pid = child.id();
    debug!(program = req.program, pid, args = ?req.args, "spawned process group");

    Ok(ProcessHandle {
        child,
        pid,
        program: req.program.to_string(),
        exited: false,
    })
}

/// Terminate the group behind `handle`, if there is one.
pub fn terminate(handle: Option<&mut ProcessHandle>) {
    if let Some(handle) = handle {
        handle.terminate();
    }
}

/// Terminate the group, then wait (bounded) for the leader to be reaped.
pub async fn teardown(handle: &mut ProcessHandle) {
    handle.terminate();
    if handle.exited {
        return;
    }

    match tokio::time::timeout(TEARDOWN_GRACE, handle.child.wait()).await {
        Ok(Ok(status)) => {
            handle.exited = true;
            debug!(pid = handle.pid, %status, "process group torn down");
        }
        Ok(Err(err)) => {
            warn!(pid = handle.pid, error = %err, "failed to reap terminated process");
        }
        Err(_) => {
            warn!(
                pid = handle.pid,
                grace = ?TEARDOWN_GRACE,
                "process did not exit after termination; killing leader directly"
            );
            let _ = handle.child.start_kill();
        }
    }
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Kill the whole group, falling back to the leader alone if the group
    /// kill fails. Safe to call any number of times.
    pub fn terminate(&mut self) {
        let mut group_killed = false;
        if let Some(pid) = self.pid {
            match PlatformGroup::kill_group(pid) {
                Ok(()) => group_killed = true,
                Err(err) => debug!(pid, error = %err, "group kill failed"),
            }
        }

        if !group_killed && !self.exited {
            if let Err(err) = self.child.start_kill() {
                trace!(pid = self.pid, error = %err, "leader kill failed");
            }
        }
    }

    /// Wait for the process while watching `cancel` and an optional hard
    /// `deadline`.
    ///
    /// On normal exit the group is swept once more (so no forked
    /// grandchild outlives the run) and output is collected for at most
    /// [`OUTPUT_GRACE`]. On cancellation or deadline the group is torn down
    /// and no output is returned.
    pub async fn wait_with_output(
        mut self,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<ProcessOutput> {
        let stdout = spawn_reader(self.child.stdout.take());
        let stderr = spawn_reader(self.child.stderr.take());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            _ = sleep_or_forever(deadline) => WaitOutcome::TimedOut,
            status = self.child.wait() => WaitOutcome::Exited(status),
        };

        let status = match outcome {
            WaitOutcome::Exited(status) => {
                self.exited = true;
                status.map_err(SentinelError::from)
            }
            WaitOutcome::Cancelled => {
                debug!(pid = self.pid, "cancellation requested; tearing down");
                teardown(&mut self).await;
                stdout.abort();
                stderr.abort();
                return Err(SentinelError::Cancelled);
            }
            WaitOutcome::TimedOut => {
                let limit = deadline.unwrap_or_default();
                warn!(pid = self.pid, ?limit, "hard deadline reached; killing process group");
                teardown(&mut self).await;
                stdout.abort();
                stderr.abort();
                return Err(SentinelError::TimedOut(limit));
            }
        };

        // Sweep anything the tool left behind in its group.
        self.terminate();
        let status = status?;

        let mut bytes = collect_bounded(stdout).await;
        bytes.extend(collect_bounded(stderr).await);

        Ok(ProcessOutput {
            status,
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// A handle dropped before its process was reaped (the waiting future was
/// dropped, or the task aborted) still takes the whole group down.
/// `kill_on_drop` alone would only reach the leader.
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        if let Some(pid) = self.pid {
            debug!(pid, program = %self.program, "handle dropped while running; killing process group");
            if let Err(err) = PlatformGroup::kill_group(pid) {
                debug!(pid, error = %err, "group kill on drop failed");
            }
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_end(&mut buf).await {
                trace!(error = %err, "output pipe closed with error");
            }
        }
        buf
    })
}

async fn collect_bounded(mut reader: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(OUTPUT_GRACE, &mut reader).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(err)) => {
            debug!(error = %err, "output reader task failed");
            Vec::new()
        }
        Err(_) => {
            debug!(grace = ?OUTPUT_GRACE, "output not drained in time; dropping it");
            reader.abort();
            Vec::new()
        }
    }
}

async fn sleep_or_forever(deadline: Option<Duration>) {
    match deadline {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn collects_stdout_then_stderr() {
        let env = BTreeMap::new();
        let args = sh("echo out; echo err 1>&2; exit 3");
        let handle = spawn(SpawnRequest {
            program: "sh",
            args: &args,
            working_dir: None,
            env: &env,
        })
        .unwrap();

        let out = handle
            .wait_with_output(&CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let env = BTreeMap::new();
        let err = spawn(SpawnRequest {
            program: "/nonexistent/sentinel-tool",
            args: &[],
            working_dir: None,
            env: &env,
        })
        .unwrap_err();
        assert!(matches!(err, SentinelError::Launch { .. }));
    }

    #[tokio::test]
    async fn deadline_kills_the_group() {
        let env = BTreeMap::new();
        let args = sh("sleep 30");
        let handle = spawn(SpawnRequest {
            program: "sh",
            args: &args,
            working_dir: None,
            env: &env,
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = handle
            .wait_with_output(&CancellationToken::new(), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, SentinelError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let env = BTreeMap::new();
        let args = sh("sleep 30");
        let mut handle = spawn(SpawnRequest {
            program: "sh",
            args: &args,
            working_dir: None,
            env: &env,
        })
        .unwrap();

        teardown(&mut handle).await;
        handle.terminate();
        terminate(Some(&mut handle));
        terminate(None);
    }
}
