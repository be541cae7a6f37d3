//! condarepo CLI application
//!
//! Mirrors one architecture of a conda repository into a local directory.
//! Exit status: 0 for a completed run (per-file failures included), 100 when
//! the manifest cannot be fetched or parsed, 101 when a pid file from another
//! run exists, 1 for anything else.

use std::process;

use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use condarepo::cli::{handle_mirror, Cli};
use condarepo::config::AppConfig;
use condarepo::errors::Result;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = AppConfig::locate(cli.config.as_deref())?;
    let config = match &config_path {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::default(),
    };
    init_logging(&cli, &config.logging.level);

    info!("condarepo v{} starting", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => debug!("No config file found in standard locations"),
    }
    handle_mirror(&cli, config).await?;
    Ok(())
}

/// Initialize logging; `-v`/`-q` win over the configured level
fn init_logging(cli: &Cli, configured_level: &str) {
    let level = cli
        .log_level()
        .map(|level| level.as_str().to_lowercase())
        .unwrap_or_else(|| configured_level.to_lowercase());

    let (filter, invalid) = match format!("condarepo={}", level).parse() {
        Ok(directive) => (EnvFilter::from_default_env().add_directive(directive), false),
        Err(_) => (EnvFilter::new("condarepo=info"), true),
    };

    // Logs go to stderr so that the report on stdout stays machine-readable.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if invalid {
        warn!("Invalid log level {:?} in configuration, using info", configured_level);
    }
}
