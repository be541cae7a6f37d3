//! Command handler
//!
//! Wires configuration, the pid file guard, the coordinator and the report
//! outputs together for one invocation.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::app::{MirrorCoordinator, PidFile, RunReport};
use crate::cli::args::Cli;
use crate::cli::progress::ProgressDisplay;
use crate::config::AppConfig;
use crate::constants::workers;
use crate::errors::Result;

/// Apply command-line flags on top of file configuration
pub fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(url) = &cli.repository_url {
        config.mirror.repository_url = url.clone();
    }
    if cli.keep_stale {
        config.mirror.keep_stale = true;
    }
    if let Some(pid_file) = &cli.pid_file {
        config.mirror.pid_file = Some(pid_file.clone());
    }
    if let Some(threads) = cli.threads {
        config.dispatch.workers = threads;
    }
    if cli.resume {
        config.transfer.resume = true;
    }
    if let Some(retries) = cli.retries {
        config.transfer.max_retries = retries;
    }
    if let Some(timeout) = cli.timeout {
        config.transfer.timeout = timeout;
    }
    if let Some(max_backoff) = cli.max_backoff {
        config.transfer.max_backoff_secs = max_backoff;
    }
}

/// Mirror one architecture and emit the report
///
/// The pid file, when configured, is only removed after a completed run. A
/// run that fails leaves it behind so the next run refuses to start until an
/// operator has looked at what happened.
pub async fn handle_mirror(cli: &Cli, mut config: AppConfig) -> Result<RunReport> {
    apply_overrides(&mut config, cli);
    let runtime = config.to_runtime_config(&cli.architecture, &cli.download_dir)?;

    let pid_file = match &config.mirror.pid_file {
        Some(path) => Some(PidFile::acquire(path).await?),
        None => None,
    };

    let (events_tx, events_rx) = mpsc::channel(workers::PROGRESS_BUFFER_SIZE);
    let progress = ProgressDisplay::new(!cli.no_progress && !cli.quiet).spawn(events_rx);

    let coordinator = MirrorCoordinator::new(runtime)?.with_events(events_tx);
    let result = coordinator.run().await;
    // Dropping the coordinator closes the event channel.
    drop(coordinator);
    let _ = progress.await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("Mirror run failed: {}", e);
            return Err(e);
        }
    };

    report.log_summary();
    write_report(&report, cli.report_file.as_deref()).await?;

    if let Some(pid_file) = pid_file {
        pid_file.release().await?;
    }
    info!("Shutting down gracefully");
    Ok(report)
}

/// Write the `key,value` report to `path`, or stdout when none is given
pub async fn write_report(report: &RunReport, path: Option<&Path>) -> Result<()> {
    let csv = report.to_csv();
    match path {
        Some(path) => {
            tokio::fs::write(path, csv).await?;
            info!("Report written to {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
