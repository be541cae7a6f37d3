//! Single transfer worker
//!
//! A worker repeatedly takes the next descriptor from the shared queue and
//! runs its transfer in a dedicated task, so a panic inside one transfer is
//! caught at the `JoinHandle` and turned into an `UnknownError` record instead
//! of taking the worker down with it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info};

use crate::app::coordinator::signals::shutdown_requested;
use crate::app::models::ResourceDescriptor;
use crate::app::transfer::TransferRecord;

/// Queue shared by all workers of one dispatch
pub type SharedQueue = Arc<Mutex<VecDeque<ResourceDescriptor>>>;

/// Worker pulling descriptors until the queue is empty or shutdown is requested
pub struct TransferWorker<F> {
    id: usize,
    queue: SharedQueue,
    job: F,
    progress_tx: Option<mpsc::Sender<TransferRecord>>,
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl<F, Fut> TransferWorker<F>
where
    F: Fn(ResourceDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TransferRecord> + Send + 'static,
{
    pub fn new(
        id: usize,
        queue: SharedQueue,
        job: F,
        progress_tx: Option<mpsc::Sender<TransferRecord>>,
        shutdown_rx: Option<broadcast::Receiver<()>>,
    ) -> Self {
        Self {
            id,
            queue,
            job,
            progress_tx,
            shutdown_rx,
        }
    }

    /// Run until the queue drains; returns this worker's records
    pub async fn run(mut self) -> Vec<TransferRecord> {
        let mut records = Vec::new();
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown_requested() {
                info!("Worker {} received shutdown signal", self.id);
                break;
            }

            // Lock is released before the transfer starts.
            let next = self.queue.lock().await.pop_front();
            let Some(descriptor) = next else {
                break;
            };

            let identifier = descriptor.identifier().to_string();
            let handle = tokio::spawn((self.job)(descriptor));

            let record = match handle.await {
                Ok(record) => record,
                Err(e) => {
                    error!("Transfer of {} aborted: {}", identifier, e);
                    TransferRecord::aborted(identifier, format!("transfer task failed: {}", e))
                }
            };

            if let Some(tx) = &self.progress_tx {
                // A closed progress channel only means nobody is watching.
                let _ = tx.send(record.clone()).await;
            }
            records.push(record);
        }

        debug!("Worker {} finished after {} transfers", self.id, records.len());
        records
    }

    fn shutdown_requested(&mut self) -> bool {
        self.shutdown_rx.as_mut().is_some_and(shutdown_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::hash::Md5Hash;
    use url::Url;

    fn queue_of(names: &[&str]) -> SharedQueue {
        let base = Url::parse("http://localhost/linux-64/").unwrap();
        let descriptors = names
            .iter()
            .map(|n| ResourceDescriptor::new(*n, 0, Md5Hash::EMPTY, &base).unwrap())
            .collect();
        Arc::new(Mutex::new(descriptors))
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let queue = queue_of(&["a", "b", "c"]);
        let worker = TransferWorker::new(
            0,
            queue.clone(),
            |d: ResourceDescriptor| async move { TransferRecord::already_present(d.identifier()) },
            None,
            None,
        );

        let records = worker.run().await;
        assert_eq!(records.len(), 3);
        assert!(queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_transfer_becomes_unknown_error() {
        let queue = queue_of(&["boom", "fine"]);
        let worker = TransferWorker::new(
            0,
            queue,
            |d: ResourceDescriptor| async move {
                if d.identifier() == "boom" {
                    panic!("transfer exploded");
                }
                TransferRecord::already_present(d.identifier())
            },
            None,
            None,
        );

        let records = worker.run().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identifier, "boom");
        assert!(matches!(
            records[0].outcome,
            crate::app::transfer::TransferOutcome::UnknownError(_)
        ));
        assert!(records[1].outcome.ok());
    }

    #[tokio::test]
    async fn test_shutdown_stops_taking_entries() {
        let queue = queue_of(&["a", "b"]);
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let worker = TransferWorker::new(
            0,
            queue.clone(),
            |d: ResourceDescriptor| async move { TransferRecord::already_present(d.identifier()) },
            None,
            Some(rx),
        );

        assert!(worker.run().await.is_empty());
        assert_eq!(queue.lock().await.len(), 2);
    }
}
