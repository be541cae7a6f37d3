//! End-of-run report
//!
//! [`RunReport`] is built once, after every worker has finished, from the
//! transfer records and the inventory counts taken around the dispatch. It has
//! two renderings: aligned human-readable lines for the log and `key,value`
//! lines for scripts.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::transfer::TransferRecord;

/// Whether the mirror now matches the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// As many local files as manifest entries
    Complete,
    /// Fewer local files than manifest entries
    Incomplete,
    /// More local files than manifest entries, e.g. kept stale files
    Anomalous,
}

impl Verdict {
    pub fn from_counts(local_after: usize, remote_total: usize) -> Self {
        match local_after.cmp(&remote_total) {
            std::cmp::Ordering::Equal => Self::Complete,
            std::cmp::Ordering::Less => Self::Incomplete,
            std::cmp::Ordering::Greater => Self::Anomalous,
        }
    }

    /// Value of the `repository_state` key
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Incomplete => "incomplete",
            Self::Anomalous => "too_many_files",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "Local repository is complete"),
            Self::Incomplete => write!(f, "Local repository is not complete"),
            Self::Anomalous => write!(
                f,
                "Local repository has more files than the remote repository"
            ),
        }
    }
}

/// Throughput figures over the files downloaded in this run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferStats {
    /// Bytes received by successful transfers
    pub bytes: u64,
    /// Wall time summed over successful transfers
    pub total_time: Duration,
    /// Slowest single transfer, bytes/s
    pub min_throughput: f64,
    /// Fastest single transfer, bytes/s
    pub max_throughput: f64,
    /// `bytes / total_time`, bytes/s
    pub avg_throughput: f64,
}

impl TransferStats {
    /// `None` when nothing was downloaded
    pub fn from_records(records: &[TransferRecord]) -> Option<Self> {
        let downloaded: Vec<&TransferRecord> = records
            .iter()
            .filter(|r| r.outcome.was_downloaded())
            .collect();
        if downloaded.is_empty() {
            return None;
        }

        let bytes = downloaded.iter().map(|r| r.bytes_transferred).sum();
        let total_time: Duration = downloaded.iter().map(|r| r.elapsed).sum();

        let (min_throughput, max_throughput) = downloaded
            .iter()
            .map(|r| r.throughput())
            .fold((f64::INFINITY, 0.0f64), |(min, max), t| (min.min(t), max.max(t)));

        let secs = total_time.as_secs_f64();
        let avg_throughput = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };

        Some(Self {
            bytes,
            total_time,
            min_throughput,
            max_throughput,
            avg_throughput,
        })
    }
}

/// Inventory figures gathered by the coordinator around the dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryCounts {
    pub remote_total: usize,
    pub local_before: usize,
    pub local_after: usize,
    pub directory_size: u64,
    pub stale: usize,
    pub freed_bytes: u64,
    pub kept_stale: bool,
}

/// Read-only summary of one mirror run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub remote_total: usize,
    pub local_before: usize,
    pub local_after: usize,
    pub packages_to_download: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failed: usize,
    /// Failures grouped by kind, e.g. `"HTTP Error 404"`
    pub failures_by_kind: BTreeMap<String, usize>,
    pub stale: usize,
    pub freed_bytes: u64,
    pub kept_stale: bool,
    pub directory_size: u64,
    pub transfer_stats: Option<TransferStats>,
    /// Shutdown was requested before every entry was processed
    pub interrupted: bool,
    pub verdict: Verdict,
}

impl RunReport {
    pub fn build(
        records: &[TransferRecord],
        counts: InventoryCounts,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        interrupted: bool,
    ) -> Self {
        let mut downloaded = 0;
        let mut already_present = 0;
        let mut failures_by_kind: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            if record.outcome.was_downloaded() {
                downloaded += 1;
            } else if record.outcome.was_present() {
                already_present += 1;
            } else if let Some(kind) = record.outcome.failure_kind() {
                *failures_by_kind.entry(kind).or_default() += 1;
            }
        }

        Self {
            started_at,
            finished_at,
            remote_total: counts.remote_total,
            local_before: counts.local_before,
            local_after: counts.local_after,
            packages_to_download: counts.remote_total.saturating_sub(counts.local_before),
            downloaded,
            already_present,
            failed: failures_by_kind.values().sum(),
            failures_by_kind,
            stale: counts.stale,
            freed_bytes: counts.freed_bytes,
            kept_stale: counts.kept_stale,
            directory_size: counts.directory_size,
            transfer_stats: TransferStats::from_records(records),
            interrupted,
            verdict: Verdict::from_counts(counts.local_after, counts.remote_total),
        }
    }

    /// Wall time of the run
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Human-readable summary lines
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            row("Process start time", self.started_at.to_rfc3339()),
            row("Process end time", self.finished_at.to_rfc3339()),
            row("Process duration", format_duration(self.duration())),
            row("Number of remote packages", self.remote_total),
            row("Local packages present before download", self.local_before),
            row("Packages to download", self.packages_to_download),
            row("Files downloaded", self.downloaded),
            row("Files already present", self.already_present),
            row("Download errors", self.failed),
        ];

        for (kind, count) in &self.failures_by_kind {
            lines.push(row(&format!("  {}", kind), count));
        }

        let stale_label = if self.kept_stale {
            "Stale packages kept (bytes that can be freed up)"
        } else {
            "Stale packages deleted (bytes freed)"
        };
        lines.push(row(
            stale_label,
            format!("{} ({})", self.stale, format_bytes(self.freed_bytes)),
        ));
        lines.push(row("Local packages present after download", self.local_after));
        lines.push(row(
            "Local repository total size",
            format!("{} bytes ({})", self.directory_size, format_bytes(self.directory_size)),
        ));

        if let Some(stats) = &self.transfer_stats {
            lines.push(row(
                "Bytes downloaded",
                format!("{} ({})", stats.bytes, format_bytes(stats.bytes)),
            ));
            lines.push(row(
                "Download time",
                format!("{:.3} seconds", stats.total_time.as_secs_f64()),
            ));
            lines.push(row("Max download speed", format_rate(stats.max_throughput)));
            lines.push(row("Min download speed", format_rate(stats.min_throughput)));
            lines.push(row("Average download speed", format_rate(stats.avg_throughput)));
        }

        if self.interrupted {
            lines.push("Run was interrupted before all packages were processed".to_string());
        }

        lines
    }

    /// Log the summary; the verdict line's level follows the verdict
    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            info!("{}", line);
        }
        match self.verdict {
            Verdict::Complete => info!("{}", self.verdict),
            Verdict::Incomplete => error!("{}", self.verdict),
            Verdict::Anomalous => warn!("{}", self.verdict),
        }
    }

    /// Machine-readable `(key, value)` pairs
    pub fn key_values(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = vec![
            kv("process_start_time", self.started_at.to_rfc3339()),
            kv("process_end_time", self.finished_at.to_rfc3339()),
            kv("process_duration_seconds", format!("{:.3}", self.duration().as_secs_f64())),
            kv("number_of_remote_packages", self.remote_total),
            kv("number_of_local_packages_present_before_download", self.local_before),
            kv("packages_to_download", self.packages_to_download),
            kv("number_of_files_downloaded", self.downloaded),
            kv("number_of_files_already_present", self.already_present),
            kv("number_of_download_errors", self.failed),
        ];

        for (kind, count) in &self.failures_by_kind {
            let key = format!("number_of_error_{}", kind.to_lowercase().replace(' ', "_"));
            pairs.push(kv(&key, count));
        }

        pairs.push(kv("number_of_stale_packages", self.stale));
        pairs.push(kv("stale_packages_kept", self.kept_stale));
        pairs.push(kv("stale_packages_bytes", self.freed_bytes));
        pairs.push(kv("number_of_local_packages_present_after_download", self.local_after));
        pairs.push(kv("local_repository_total_size_after_download_bytes", self.directory_size));

        if let Some(stats) = &self.transfer_stats {
            pairs.push(kv("bytes_downloaded", stats.bytes));
            pairs.push(kv(
                "download_time_seconds",
                format!("{:.3}", stats.total_time.as_secs_f64()),
            ));
            pairs.push(kv("max_download_speed_bytes_per_sec", format!("{:.0}", stats.max_throughput)));
            pairs.push(kv("min_download_speed_bytes_per_sec", format!("{:.0}", stats.min_throughput)));
            pairs.push(kv(
                "average_download_speed_bytes_per_sec",
                format!("{:.0}", stats.avg_throughput),
            ));
        }

        pairs.push(kv("run_interrupted", self.interrupted));
        pairs.push(kv("repository_state", self.verdict.as_key()));
        pairs
    }

    /// `key,value` lines, newline-terminated
    pub fn to_csv(&self) -> String {
        self.key_values()
            .into_iter()
            .map(|(k, v)| format!("{},{}\n", k, v))
            .collect()
    }
}

fn row(label: &str, value: impl fmt::Display) -> String {
    format!("{:<52}{}", label, value)
}

fn kv(key: &str, value: impl fmt::Display) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

fn format_rate(bytes_per_sec: f64) -> String {
    format!(
        "{:.0} bytes/sec ({}/sec)",
        bytes_per_sec,
        format_bytes(bytes_per_sec as u64)
    )
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m{}s", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60)
    }
}
