//! Immutable runtime configuration.
//!
//! Built once at startup (from CLI flags and environment in `main.rs`) and
//! passed by reference into the gateway and validator. Nothing in the library
//! reads the environment on its own.

use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::consts::{
    DEFAULT_ALLOWED_ORIGINS, DEFAULT_BIND_ADDRESS, DEFAULT_DB_PATH, DEFAULT_MAX_QUERY_CHARS,
    DEFAULT_THREADS, DEFAULT_TIMEOUT_SECS, DEFAULT_TOOL,
};

/// Multipart framing overhead allowed on top of the query itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Settings for validating queries and running the search tool.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Search tool binary.
    pub tool: PathBuf,
    /// Reference database handed to the tool with `--db`.
    pub db_path: PathBuf,
    /// Value of `--threads`.
    pub threads: u32,
    /// Wall-clock limit for one tool run.
    pub timeout: Duration,
    /// Query size ceiling, in characters.
    pub max_query_chars: usize,
    /// Where staged query files are created.
    pub scratch_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_TOOL),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            threads: DEFAULT_THREADS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl GatewayConfig {
    /// Largest request body worth reading. A UTF-8 char is at most 4 bytes.
    pub fn body_limit_bytes(&self) -> usize {
        self.max_query_chars
            .saturating_mul(4)
            .saturating_add(FORM_OVERHEAD_BYTES)
    }
}

/// Cross-origin sources allowed to call the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl FromStr for AllowedOrigins {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let origins: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.iter().any(|o| o == "*") {
            return Ok(Self::Any);
        }
        Ok(Self::List(origins))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub allowed_origins: AllowedOrigins,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND_ADDRESS, DEFAULT_ALLOWED_ORIGINS)
    }
}

impl ServerConfig {
    pub fn new(bind_address: impl Into<String>, allowed_origins: &str) -> Self {
        let Ok(allowed_origins) = allowed_origins.parse::<AllowedOrigins>();
        Self {
            bind_address: bind_address.into(),
            allowed_origins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.tool, PathBuf::from("diamond"));
        assert_eq!(config.db_path, PathBuf::from("/data/mydb.dmnd"));
        assert_eq!(config.threads, 1);
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.max_query_chars, 200_000);
    }

    #[test]
    fn body_limit_covers_multibyte_query() {
        let config = GatewayConfig {
            max_query_chars: 10,
            ..GatewayConfig::default()
        };
        assert_eq!(config.body_limit_bytes(), 40 + 64 * 1024);
    }

    #[test]
    fn body_limit_saturates() {
        let config = GatewayConfig {
            max_query_chars: usize::MAX,
            ..GatewayConfig::default()
        };
        assert_eq!(config.body_limit_bytes(), usize::MAX);
    }

    #[test]
    fn star_means_any_origin() {
        assert_eq!("*".parse::<AllowedOrigins>(), Ok(AllowedOrigins::Any));
        assert_eq!("  * ".parse::<AllowedOrigins>(), Ok(AllowedOrigins::Any));
    }

    #[test]
    fn wildcard_anywhere_means_any_origin() {
        assert_eq!(
            "https://a.io, *".parse::<AllowedOrigins>(),
            Ok(AllowedOrigins::Any)
        );
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let parsed: AllowedOrigins = "https://a.github.io, https://b.example.com ,,"
            .parse()
            .unwrap();
        assert_eq!(
            parsed,
            AllowedOrigins::List(vec![
                "https://a.github.io".to_string(),
                "https://b.example.com".to_string(),
            ])
        );
    }

    #[test]
    fn empty_origins_allow_nothing() {
        assert_eq!(
            "".parse::<AllowedOrigins>(),
            Ok(AllowedOrigins::List(vec![]))
        );
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.allowed_origins, AllowedOrigins::Any);
    }

    #[test]
    fn server_new_parses_origins() {
        let config = ServerConfig::new("127.0.0.1:9000", "https://x.io");
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.allowed_origins,
            AllowedOrigins::List(vec!["https://x.io".to_string()])
        );
    }
}
