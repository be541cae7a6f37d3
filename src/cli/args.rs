//! Command-line argument parsing

use std::path::PathBuf;

use clap::Parser;

/// condarepo - mirror a conda package repository
#[derive(Parser, Debug, Clone)]
#[command(
    name = "condarepo",
    version,
    about = "Mirror one architecture of a conda repository into a local directory",
    long_about = "Downloads repodata.json and every package it lists into DOWNLOAD_DIR/ARCHITECTURE.
Packages are verified against their MD5 checksum, failed downloads are retried with
exponential backoff, and local packages no longer listed are removed unless --keep-stale is set."
)]
pub struct Cli {
    /// Architecture to mirror, e.g. linux-64, win-64, noarch
    #[arg(value_name = "ARCHITECTURE")]
    pub architecture: String,

    /// Mirror root; packages land in DOWNLOAD_DIR/ARCHITECTURE
    #[arg(value_name = "DOWNLOAD_DIR")]
    pub download_dir: PathBuf,

    /// Number of concurrent downloads (default: CPU cores + 1)
    #[arg(short = 't', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Repository URL
    #[arg(short = 'u', long, value_name = "URL")]
    pub repository_url: Option<String>,

    /// Do not delete local packages no longer listed in the repository
    #[arg(short = 'k', long)]
    pub keep_stale: bool,

    /// Pid file guarding against concurrent runs
    #[arg(short = 'p', long, value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Continue interrupted downloads with range requests
    #[arg(long)]
    pub resume: bool,

    /// Retries after the first failed attempt of each file
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Give up an attempt after this long without receiving data, e.g. 60s or 2m
    #[arg(long, value_name = "DURATION", value_parser = humantime_serde::re::humantime::parse_duration)]
    pub timeout: Option<std::time::Duration>,

    /// Ceiling of the retry backoff in seconds
    #[arg(long, value_name = "SECS")]
    pub max_backoff: Option<u64>,

    /// Write the key,value report to FILE instead of stdout
    #[arg(long, value_name = "FILE")]
    pub report_file: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level selected by the verbosity flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.quiet {
            Some(tracing::Level::WARN)
        } else if self.verbose {
            Some(tracing::Level::DEBUG)
        } else {
            None
        }
    }
}
