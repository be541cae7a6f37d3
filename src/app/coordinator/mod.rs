//! Mirror run orchestration
//!
//! [`MirrorCoordinator::run`] drives one complete mirror pass:
//!
//! 1. create `<download_dir>/<architecture>/`
//! 2. fetch and parse `repodata.json` (the only fatal step)
//! 3. recover leftovers and reconcile stale files
//! 4. dispatch one transfer per manifest entry
//! 5. build the [`RunReport`] from the records and the inventory counts
//!
//! A Ctrl-C or SIGTERM during the run stops the workers from taking new
//! entries; the report then covers what was processed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use condarepo::app::{CoordinatorConfig, MirrorCoordinator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoordinatorConfig::new("linux-64", "/srv/conda")?.with_worker_count(8);
//! let coordinator = MirrorCoordinator::new(config)?;
//!
//! let report = coordinator.run().await?;
//! report.log_summary();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod report;
pub mod signals;

use std::path::Path;

use chrono::Utc;
use tokio::fs;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use url::Url;

use crate::app::inventory::{directory_size, InventoryReconciler};
use crate::app::manifest::{Manifest, ManifestFetcher};
use crate::app::models::ResourceDescriptor;
use crate::app::transfer::{TransferEngine, TransferRecord};
use crate::app::worker::WorkDispatcher;
use crate::constants::{repo, workers};
use crate::errors::{ConfigResult, InventoryError, Result};

pub use config::{parse_repository_url, CoordinatorConfig};
pub use report::{format_bytes, InventoryCounts, RunReport, TransferStats, Verdict};
pub use signals::{create_shutdown_channel, shutdown_requested, SignalHandler};

/// Progress notifications emitted during a run
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Manifest parsed; `total` transfers are about to be dispatched
    Planned { total: usize },
    /// One transfer reached its final outcome
    Transferred(TransferRecord),
}

/// Orchestrates one mirror run
pub struct MirrorCoordinator {
    config: CoordinatorConfig,
    engine: TransferEngine,
    events_tx: Option<mpsc::Sender<RunEvent>>,
    shutdown_tx: broadcast::Sender<()>,
    listen_for_signals: bool,
}

impl MirrorCoordinator {
    /// Validate the configuration and build the shared HTTP client
    pub fn new(config: CoordinatorConfig) -> ConfigResult<Self> {
        config.validate()?;
        let client = config.client.build_http_client()?;
        let (shutdown_tx, _) = create_shutdown_channel();

        Ok(Self {
            config,
            engine: TransferEngine::new(client),
            events_tx: None,
            shutdown_tx,
            listen_for_signals: true,
        })
    }

    /// Report progress on `events_tx`
    pub fn with_events(mut self, events_tx: mpsc::Sender<RunEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Do not install Ctrl-C / SIGTERM handlers
    pub fn without_signal_handling(mut self) -> Self {
        self.listen_for_signals = false;
        self
    }

    /// Run the mirror pass and build its report
    ///
    /// # Errors
    ///
    /// Fails when the mirror directory cannot be created or listed, or when
    /// the manifest cannot be fetched or parsed. Per-file transfer failures
    /// are counted in the report instead.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let base_url = self.config.base_url()?;
        let mirror_dir = self.config.mirror_dir();

        fs::create_dir_all(&mirror_dir)
            .await
            .map_err(|source| InventoryError::CreateDir {
                path: mirror_dir.clone(),
                source,
            })?;

        info!(
            "Start mirroring repository {} to local directory {} using {} workers",
            base_url,
            mirror_dir.display(),
            self.config.dispatch.worker_count
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let signal_task = self
            .listen_for_signals
            .then(|| SignalHandler::new(self.shutdown_tx.clone()).setup());

        let result = self.mirror(&base_url, &mirror_dir, &mut shutdown_rx).await;

        if let Some(task) = signal_task {
            task.abort();
        }

        let (records, counts, interrupted) = result?;
        Ok(RunReport::build(
            &records,
            counts,
            started_at,
            Utc::now(),
            interrupted,
        ))
    }

    async fn mirror(
        &self,
        base_url: &Url,
        mirror_dir: &Path,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(Vec<TransferRecord>, InventoryCounts, bool)> {
        let options = &self.config.transfer;

        let manifest_path = ManifestFetcher::new(self.engine.clone())
            .fetch(base_url, mirror_dir, options)
            .await?;
        let manifest = Manifest::load(&manifest_path).await?;
        info!("{} contains {} packages", repo::MANIFEST_FILE_NAME, manifest.len());

        let descriptors = manifest.descriptors(base_url)?;
        let remote_keys = manifest.key_set();

        let reconciler = InventoryReconciler::new(mirror_dir);
        let reconciled = reconciler
            .reconcile(&remote_keys, self.config.keep_stale, options.resume)
            .await?;
        let local_before = reconciler.scan().await?.len();

        self.emit(RunEvent::Planned {
            total: descriptors.len(),
        })
        .await;

        let mut interrupted = shutdown_requested(shutdown_rx);
        let records = if interrupted {
            warn!("Shutdown requested before any transfer started");
            Vec::new()
        } else {
            self.dispatch(descriptors, mirror_dir).await
        };
        interrupted |= shutdown_requested(shutdown_rx);

        let local_after = reconciler.scan().await?.len();
        let counts = InventoryCounts {
            remote_total: manifest.len(),
            local_before,
            local_after,
            directory_size: directory_size(mirror_dir).await?,
            stale: reconciled.stale.len(),
            freed_bytes: reconciled.freed_bytes,
            kept_stale: reconciled.kept,
        };

        Ok((records, counts, interrupted))
    }

    async fn dispatch(
        &self,
        descriptors: Vec<ResourceDescriptor>,
        mirror_dir: &Path,
    ) -> Vec<TransferRecord> {
        let dispatcher =
            WorkDispatcher::new(self.config.dispatch.clone()).with_shutdown(self.shutdown_tx.clone());

        // Per-file records are forwarded as run events.
        let (dispatcher, forwarder) = match self.events_tx.clone() {
            Some(events_tx) => {
                let (records_tx, mut records_rx) = mpsc::channel(workers::PROGRESS_BUFFER_SIZE);
                let forwarder = tokio::spawn(async move {
                    while let Some(record) = records_rx.recv().await {
                        if events_tx.send(RunEvent::Transferred(record)).await.is_err() {
                            break;
                        }
                    }
                });
                (dispatcher.with_progress(records_tx), Some(forwarder))
            }
            None => (dispatcher, None),
        };

        let records = dispatcher
            .dispatch(descriptors, self.engine.clone(), mirror_dir, &self.config.transfer)
            .await;

        // Closes the record channel so the forwarder can finish.
        drop(dispatcher);
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        records
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(event).await;
        }
    }
}
