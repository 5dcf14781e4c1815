use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diamond_web::api::create_router;
use diamond_web::config::{GatewayConfig, ServerConfig};
use diamond_web::consts::{
    DEFAULT_ALLOWED_ORIGINS, DEFAULT_BIND_ADDRESS, DEFAULT_DB_PATH, DEFAULT_MAX_QUERY_CHARS,
    DEFAULT_THREADS, DEFAULT_TIMEOUT_SECS, DEFAULT_TOOL,
};
use diamond_web::gateway::process::SystemRunner;
use diamond_web::search::SearchService;

#[derive(Parser)]
#[command(
    name = "diamond-web",
    version,
    about = "Run FASTA queries through DIAMOND over HTTP."
)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// DIAMOND binary
    #[arg(long, env = "DIAMOND_BIN", default_value = DEFAULT_TOOL)]
    tool: PathBuf,

    /// Reference database (.dmnd)
    #[arg(long, env = "DB_PATH", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Threads passed to DIAMOND
    #[arg(
        long,
        env = "DIAMOND_THREADS",
        default_value_t = DEFAULT_THREADS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    threads: u32,

    /// Per-search timeout in seconds
    #[arg(
        long,
        env = "TIMEOUT_SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Maximum query size in characters
    #[arg(long, env = "MAX_FASTA_CHARS", default_value_t = DEFAULT_MAX_QUERY_CHARS)]
    max_fasta_chars: usize,

    /// Allowed CORS origins: `*` or a comma-separated list
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGINS)]
    allowed_origins: String,

    /// Directory for staged query files (default: system temp dir)
    #[arg(long, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,
}

impl Cli {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            tool: self.tool.clone(),
            db_path: self.db.clone(),
            threads: self.threads,
            timeout: Duration::from_secs(self.timeout),
            max_query_chars: self.max_fasta_chars,
            scratch_dir: self
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.bind.clone(), &self.allowed_origins)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,diamond_web=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let gateway_config = Arc::new(cli.gateway_config());
    let server_config = cli.server_config();

    if !gateway_config.db_path.exists() {
        tracing::warn!(
            db = %gateway_config.db_path.display(),
            "reference database not found; searches will fail"
        );
    }

    info!(
        tool = %gateway_config.tool.display(),
        db = %gateway_config.db_path.display(),
        threads = gateway_config.threads,
        timeout = ?gateway_config.timeout,
        max_query_chars = gateway_config.max_query_chars,
        scratch_dir = %gateway_config.scratch_dir.display(),
        "gateway configured"
    );

    let service = Arc::new(SearchService::new(
        gateway_config,
        Arc::new(SystemRunner::new()),
    ));
    let router = create_router(service, &server_config).context("failed to build router")?;

    let listener = TcpListener::bind(&server_config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", server_config.bind_address))?;
    info!(address = %server_config.bind_address, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_flags_build_configs() {
        let cli = Cli::try_parse_from([
            "diamond-web",
            "--db",
            "/data/ref.dmnd",
            "--threads",
            "8",
            "--timeout",
            "5",
            "--max-fasta-chars",
            "1000",
            "--allowed-origins",
            "https://a.io",
            "--scratch-dir",
            "/var/tmp/q",
        ])
        .unwrap();

        let gateway = cli.gateway_config();
        assert_eq!(gateway.db_path, PathBuf::from("/data/ref.dmnd"));
        assert_eq!(gateway.threads, 8);
        assert_eq!(gateway.timeout, Duration::from_secs(5));
        assert_eq!(gateway.max_query_chars, 1000);
        assert_eq!(gateway.scratch_dir, PathBuf::from("/var/tmp/q"));

        let server = cli.server_config();
        assert_eq!(
            server.allowed_origins,
            diamond_web::config::AllowedOrigins::List(vec!["https://a.io".to_string()])
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["diamond-web", "--timeout", "0"]).is_err());
    }
}
