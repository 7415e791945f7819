//! Shutdown signal handling.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cancel `cancel` once `signal` fires.
///
/// A signal that cannot be registered is logged and leaves the watcher
/// running. The task also exits when `cancel` is cancelled elsewhere and
/// resolves to `true` only if the signal did the cancelling.
pub fn spawn_shutdown_listener<F>(signal: F, cancel: CancellationToken) -> JoinHandle<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Shutdown listener stopped");
                false
            }
            received = signal => match received {
                Ok(()) => {
                    info!("Shutdown signal received");
                    cancel.cancel();
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Failed to listen for shutdown signal; continuing without it");
                    false
                }
            },
        }
    })
}
