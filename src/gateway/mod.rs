pub mod mock;
pub mod process;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::config::GatewayConfig;
use crate::consts::{MAX_TARGET_SEQS, OUTPUT_FORMAT, STDERR_TAIL_CHARS};

/// Which DIAMOND alignment to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Protein query against protein database.
    Primary,
    /// Nucleotide query, translated before comparison.
    Translated,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Primary => "blastp",
            SearchMode::Translated => "blastx",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program and its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    /// The argument following `flag`, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }
}

/// How one process run ended. Exactly one variant per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success { stdout: Vec<u8>, stderr: Vec<u8> },
    /// Non-zero exit. `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32>, stderr: Vec<u8> },
    TimedOut,
}

/// Launches a process and waits for it, bounded by `timeout`.
/// `Err` means the process could not be started or observed at all.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn invoke(&self, invocation: &Invocation, timeout: Duration)
    -> io::Result<ExecutionOutcome>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
    #[error("search tool failed (code {code}): {stderr_tail}")]
    ToolExecution { code: ExitCode, stderr_tail: String },
    #[error("failed to launch search tool: {0}")]
    Launch(#[source] io::Error),
}

/// Exit code of a failed run; `None` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub Option<i32>);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => f.write_str("signal"),
        }
    }
}

/// Last `max_chars` characters of `stderr`, decoded lossily.
pub fn stderr_tail(stderr: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let total = text.chars().count();
    if total <= max_chars {
        return text.into_owned();
    }
    text.chars().skip(total - max_chars).collect()
}

/// Runs DIAMOND searches against the configured database.
pub struct SearchGateway {
    runner: Arc<dyn ProcessRunner>,
    config: Arc<GatewayConfig>,
}

impl SearchGateway {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: Arc<GatewayConfig>) -> Self {
        Self { runner, config }
    }

    /// Fixed argument contract. Only `mode` and `query` vary per request.
    pub fn invocation(&self, mode: SearchMode, query: &Path) -> Invocation {
        let args = vec![
            OsString::from(mode.as_str()),
            OsString::from("--db"),
            self.config.db_path.clone().into_os_string(),
            OsString::from("--query"),
            query.as_os_str().to_os_string(),
            OsString::from("--threads"),
            OsString::from(self.config.threads.to_string()),
            OsString::from("--outfmt"),
            OsString::from(OUTPUT_FORMAT),
            OsString::from("--max-target-seqs"),
            OsString::from(MAX_TARGET_SEQS.to_string()),
            OsString::from("--header"),
        ];
        Invocation {
            program: self.config.tool.clone(),
            args,
        }
    }

    /// Run one search over a staged query. Returns the tool's stdout verbatim.
    pub async fn run(
        &self,
        mode: SearchMode,
        artifact: &Artifact,
    ) -> Result<Vec<u8>, GatewayError> {
        let invocation = self.invocation(mode, artifact.path());
        let timeout = self.config.timeout;

        let outcome = self
            .runner
            .invoke(&invocation, timeout)
            .await
            .map_err(|e| {
                warn!(
                    %mode,
                    tool = %invocation.program.display(),
                    error = %e,
                    "could not launch search tool"
                );
                GatewayError::Launch(e)
            })?;

        match outcome {
            ExecutionOutcome::Success { stdout, stderr } => {
                if !stderr.is_empty() {
                    let tail = stderr_tail(&stderr, STDERR_TAIL_CHARS);
                    debug!(%mode, stderr = %tail, "search tool stderr");
                }
                info!(%mode, bytes = stdout.len(), "search finished");
                Ok(stdout)
            }
            ExecutionOutcome::Failed { code, stderr } => {
                let stderr_tail = stderr_tail(&stderr, STDERR_TAIL_CHARS);
                let code = ExitCode(code);
                warn!(%mode, %code, stderr = %stderr_tail, "search tool failed");
                Err(GatewayError::ToolExecution { code, stderr_tail })
            }
            ExecutionOutcome::TimedOut => {
                warn!(%mode, ?timeout, "search timed out");
                Err(GatewayError::Timeout(timeout))
            }
        }
    }
}
