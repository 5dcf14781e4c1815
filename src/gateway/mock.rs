use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ExecutionOutcome, Invocation, ProcessRunner};

/// What a [`MockRunner`] does when invoked.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Exit 0 with this stdout.
    Output(Vec<u8>),
    /// Exit 0, printing `header` followed by the contents of the `--query` file.
    EchoQuery { header: String },
    /// Exit with `code`, printing `stderr`.
    Exit { code: i32, stderr: String },
    /// Report a timeout.
    TimeOut,
    /// Fail to start, as if the binary were missing.
    LaunchFailure,
}

/// A scripted process runner for tests. Never launches anything; records
/// every invocation it receives.
pub struct MockRunner {
    behavior: MockBehavior,
    calls: AtomicUsize,
    invocations: Mutex<Vec<Invocation>>,
    last_timeout: Mutex<Option<Duration>>,
}

impl MockRunner {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
            last_timeout: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().await.clone()
    }

    pub async fn last_timeout(&self) -> Option<Duration> {
        *self.last_timeout.lock().await
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn invoke(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> io::Result<ExecutionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations.lock().await.push(invocation.clone());
        *self.last_timeout.lock().await = Some(timeout);

        match &self.behavior {
            MockBehavior::Output(stdout) => Ok(ExecutionOutcome::Success {
                stdout: stdout.clone(),
                stderr: Vec::new(),
            }),
            MockBehavior::EchoQuery { header } => {
                let query = invocation.arg_after("--query").ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "MockRunner: no --query argument")
                })?;
                let mut stdout = header.clone().into_bytes();
                stdout.extend(tokio::fs::read(Path::new(query)).await?);
                Ok(ExecutionOutcome::Success {
                    stdout,
                    stderr: Vec::new(),
                })
            }
            MockBehavior::Exit { code, stderr } => Ok(ExecutionOutcome::Failed {
                code: Some(*code),
                stderr: stderr.clone().into_bytes(),
            }),
            MockBehavior::TimeOut => Ok(ExecutionOutcome::TimedOut),
            MockBehavior::LaunchFailure => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "MockRunner: no such file or directory",
            )),
        }
    }
}
