//! First-interaction audio unlock.
//!
//! Some hosts refuse sound output until the user has interacted with them.
//! The hook waits for the first interaction, prepares the shared sound engine
//! through the dispatcher, then detaches.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::AlertDispatcher;
use crate::interaction::InteractionBus;

/// Spawn the one-shot unlock hook.
///
/// The subscription is taken before this returns, so no interaction published
/// afterwards is missed. The task resolves to `true` if it ran the unlock.
pub fn spawn_unlock_hook(
    bus: &InteractionBus,
    dispatcher: Arc<AlertDispatcher>,
    cancel: CancellationToken,
) -> JoinHandle<bool> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        let triggered = tokio::select! {
            _ = cancel.cancelled() => false,
            received = rx.recv() => match received {
                Ok(_) | Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => false,
            },
        };
        // Detach before doing the work
        drop(rx);

        if !triggered {
            debug!("Audio unlock hook detached without interaction");
            return false;
        }

        match dispatcher.unlock_audio().await {
            Ok(()) => info!("Audio unlocked by first interaction"),
            Err(e) => warn!(error = %e, "Audio unlock failed"),
        }
        true
    })
}
