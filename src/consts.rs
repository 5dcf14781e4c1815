//! Project-wide constants.

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Search tool binary, resolved through `PATH` unless a full path is given.
pub const DEFAULT_TOOL: &str = "diamond";

/// Default DIAMOND reference database.
pub const DEFAULT_DB_PATH: &str = "/data/mydb.dmnd";

pub const DEFAULT_THREADS: u32 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Maximum accepted query size, in characters (~200 KB).
pub const DEFAULT_MAX_QUERY_CHARS: usize = 200_000;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// `*` allows any origin; otherwise a comma-separated list.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "*";

/// Hits reported per query. Fixed, not user-controlled.
pub const MAX_TARGET_SEQS: u32 = 25;

/// DIAMOND output format 6: BLAST tabular.
pub const OUTPUT_FORMAT: &str = "6";

/// How much of the tool's stderr is surfaced on failure, in characters.
pub const STDERR_TAIL_CHARS: usize = 1500;

/// FASTA record header marker.
pub const HEADER_MARKER: char = '>';

/// Environment variables passed through to the search tool. Everything else is stripped.
pub const SAFE_ENV_VARS: &[&str] = &["PATH", "HOME", "USER", "LANG", "LC_ALL", "TMPDIR", "TZ"];
