//! Graceful shutdown with a bounded drain.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinates the gateway's shutdown sequence: fans the stop signal out to
/// the accept loop and every route's health-check loop, then bounds how long
/// in-flight requests may drain before the process gives up on them.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    grace: Duration,
}

impl ShutdownController {
    pub fn new(grace: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, grace }
    }

    /// Receiver for a task that must stop when shutdown begins.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell all subscribers to stop, without waiting for them.
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    /// Signal shutdown, then wait for the server task to finish draining
    /// within the grace period. Returns false when the deadline passed with
    /// requests still in flight.
    pub async fn drain(&self, server: JoinHandle<std::io::Result<()>>) -> bool {
        self.signal();

        match tokio::time::timeout(self.grace, server).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Server exited with an error during drain");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Server task failed during drain");
                true
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    "Drain deadline exceeded, abandoning in-flight requests"
                );
                false
            }
        }
    }
}
