//! Ctrl-C / SIGTERM handling
//!
//! A signal stops workers from taking new entries. Transfers already running
//! finish on their own; anything cut short leaves a `.tmp-download` file that
//! the next run recovers.

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Broadcasts shutdown when the process is asked to stop
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<()>,
}

impl SignalHandler {
    pub fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self { shutdown_tx }
    }

    /// Spawn the task waiting for Ctrl-C or SIGTERM
    ///
    /// Abort the returned handle once the run is over.
    pub fn setup(&self) -> JoinHandle<()> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Cannot listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, finishing running transfers");
                },
                _ = terminate => {
                    info!("Received terminate signal, finishing running transfers");
                },
            }

            let _ = shutdown_tx.send(());
        })
    }
}

/// Shutdown broadcaster; subscribe once per listener
pub fn create_shutdown_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

/// True if shutdown was broadcast since `rx` subscribed
pub fn shutdown_requested(rx: &mut broadcast::Receiver<()>) -> bool {
    matches!(
        rx.try_recv(),
        Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_multiple_shutdown_receivers() {
        let (tx, _) = create_shutdown_channel();
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(());
        });

        assert!(timeout(Duration::from_millis(200), rx1.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(200), rx2.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_requested_polls_without_blocking() {
        let (tx, mut rx) = create_shutdown_channel();
        assert!(!shutdown_requested(&mut rx));

        tx.send(()).unwrap();
        assert!(shutdown_requested(&mut rx));
    }

    #[tokio::test]
    async fn test_signal_handler_can_be_aborted() {
        let (tx, _rx) = create_shutdown_channel();
        let handle = SignalHandler::new(tx).setup();
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
