use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ExecutionOutcome, Invocation, ProcessRunner};
use crate::consts::SAFE_ENV_VARS;

/// Runs real processes with `tokio::process`.
///
/// The child gets no stdin, a sanitized environment, and piped stdout/stderr
/// that are drained concurrently so a chatty tool can't deadlock on a full
/// pipe. The child leads its own process group. The deadline covers both the
/// wait and the drain. When it passes, the whole group is killed and the child
/// is reaped before `invoke` returns.
pub struct SystemRunner {
    env: Vec<(String, String)>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRunner {
    /// Capture the safe subset of the current environment.
    pub fn new() -> Self {
        Self {
            env: Self::filtered_env(),
        }
    }

    fn filtered_env() -> Vec<(String, String)> {
        SAFE_ENV_VARS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|val| (key.to_string(), val)))
            .collect()
    }
}

fn drain<R>(stream: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            stream.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn collect(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle.await.map_err(io::Error::other)?
}

/// The process group a spawned tool leads.
///
/// Killing the group also takes down anything a wrapper script started. If
/// the guard is dropped while still armed (the request was abandoned), the
/// group is killed in the background.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }

    async fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        match kill_command(pgid).status().await {
            Ok(status) if status.success() => debug!(pgid, "killed process group"),
            // Already empty.
            Ok(_) => debug!(pgid, "process group gone before kill"),
            Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        // The runtime reaps the dropped `kill` child.
        if let Err(e) = kill_command(pgid).spawn() {
            warn!(pgid, error = %e, "failed to kill abandoned process group");
        }
    }
}

fn kill_command(pgid: u32) -> Command {
    let mut cmd = Command::new("kill");
    cmd.args(["-KILL", "--", format!("-{pgid}").as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn invoke(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> io::Result<ExecutionOutcome> {
        let deadline = Instant::now() + timeout;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;
        debug!(pid = ?child.id(), program = %invocation.program.display(), "spawned");
        let mut group = ProcessGroup::new(if cfg!(unix) { child.id() } else { None });

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let stdout_abort = stdout.abort_handle();
        let stderr_abort = stderr.abort_handle();

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                // Group first: the leader is not reaped yet, so the pgid is still ours.
                group.kill().await;
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out process");
                }
                stdout_abort.abort();
                stderr_abort.abort();
                return Ok(ExecutionOutcome::TimedOut);
            }
        };

        // The process is gone, but a descendant may still hold the pipes open.
        let output = tokio::time::timeout_at(deadline, async {
            let stdout = collect(stdout).await?;
            let stderr = collect(stderr).await?;
            Ok::<_, io::Error>((stdout, stderr))
        })
        .await;

        let (stdout, stderr) = match output {
            Ok(output) => {
                group.disarm();
                output?
            }
            Err(_) => {
                group.kill().await;
                stdout_abort.abort();
                stderr_abort.abort();
                return Ok(ExecutionOutcome::TimedOut);
            }
        };

        if status.success() {
            Ok(ExecutionOutcome::Success { stdout, stderr })
        } else {
            Ok(ExecutionOutcome::Failed {
                code: status.code(),
                stderr,
            })
        }
    }
}
