//! Bounded pool of transfer workers
//!
//! The dispatcher fills a shared queue with the descriptors to fetch, spawns a
//! fixed number of [`TransferWorker`]s that drain it, and concatenates the
//! records each worker returns once every worker has finished.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};

use super::config::DispatchConfig;
use super::core::{SharedQueue, TransferWorker};
use crate::app::models::ResourceDescriptor;
use crate::app::transfer::{TransferEngine, TransferOptions, TransferRecord};

/// Runs transfers concurrently, bounded by the configured worker count
#[derive(Debug, Clone)]
pub struct WorkDispatcher {
    config: DispatchConfig,
    progress_tx: Option<mpsc::Sender<TransferRecord>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl WorkDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            progress_tx: None,
            shutdown_tx: None,
        }
    }

    /// Send every finished record to `progress_tx` as well
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<TransferRecord>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Stop taking new entries once `shutdown_tx` fires
    pub fn with_shutdown(mut self, shutdown_tx: broadcast::Sender<()>) -> Self {
        self.shutdown_tx = Some(shutdown_tx);
        self
    }

    /// Fetch every descriptor into `destination_dir` with `engine`
    pub async fn dispatch(
        &self,
        descriptors: Vec<ResourceDescriptor>,
        engine: TransferEngine,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> Vec<TransferRecord> {
        let destination_dir = Arc::new(destination_dir.to_path_buf());
        let options = Arc::new(options.clone());

        self.dispatch_with(descriptors, move |descriptor| {
            let engine = engine.clone();
            let destination_dir = destination_dir.clone();
            let options = options.clone();
            async move { engine.fetch(&descriptor, &destination_dir, &options).await }
        })
        .await
    }

    /// Run `job` once per descriptor on the worker pool
    ///
    /// Each descriptor yields exactly one record unless shutdown is requested
    /// before a worker picks it up. Descriptors repeating an identifier are
    /// dropped so that no two transfers write the same file.
    pub async fn dispatch_with<F, Fut>(
        &self,
        descriptors: Vec<ResourceDescriptor>,
        job: F,
    ) -> Vec<TransferRecord>
    where
        F: Fn(ResourceDescriptor) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = TransferRecord> + Send + 'static,
    {
        let queue = unique_queue(descriptors);
        let total = queue.len();
        if total == 0 {
            return Vec::new();
        }

        let worker_count = self.config.effective_workers(total);
        info!("Dispatching {} transfers to {} workers", total, worker_count);

        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        let mut handles = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let worker = TransferWorker::new(
                id,
                queue.clone(),
                job.clone(),
                self.progress_tx.clone(),
                self.shutdown_tx.as_ref().map(|tx| tx.subscribe()),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        let mut records = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(worker_records) => records.extend(worker_records),
                Err(e) => error!("Worker panicked: {}", e),
            }
        }

        let skipped = queue.lock().await.len();
        if skipped > 0 {
            warn!("{} transfers were not started because of shutdown", skipped);
        }

        info!("Dispatch finished: {} of {} transfers processed", records.len(), total);
        records
    }
}

fn unique_queue(descriptors: Vec<ResourceDescriptor>) -> VecDeque<ResourceDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| {
            let fresh = seen.insert(d.identifier().to_string());
            if !fresh {
                warn!("Duplicate entry {} ignored", d.identifier());
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::hash::Md5Hash;
    use url::Url;

    fn descriptors(names: &[&str]) -> Vec<ResourceDescriptor> {
        let base = Url::parse("http://localhost/linux-64/").unwrap();
        names
            .iter()
            .map(|n| ResourceDescriptor::new(*n, 0, Md5Hash::EMPTY, &base).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(4));
        let records = dispatcher
            .dispatch_with(Vec::new(), |d: ResourceDescriptor| async move {
                TransferRecord::already_present(d.identifier())
            })
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_collapse() {
        let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(2));
        let records = dispatcher
            .dispatch_with(descriptors(&["a", "b", "a"]), |d: ResourceDescriptor| async move {
                TransferRecord::already_present(d.identifier())
            })
            .await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_progress_receives_every_record() {
        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = WorkDispatcher::new(DispatchConfig::with_worker_count(3)).with_progress(tx);

        let records = dispatcher
            .dispatch_with(descriptors(&["a", "b", "c", "d"]), |d: ResourceDescriptor| async move {
                TransferRecord::already_present(d.identifier())
            })
            .await;
        drop(dispatcher);

        let mut seen = 0;
        while rx.recv().await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, records.len());
        assert_eq!(seen, 4);
    }
}
