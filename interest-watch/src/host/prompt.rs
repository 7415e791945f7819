//! Terminal fallback prompt and the line-based interaction feed.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::alert::{BlockingPrompt, ChannelError};
use crate::interaction::{Interaction, InteractionBus};

/// Prints the message with a bell on stderr and waits until the user presses
/// Enter.
pub struct TerminalPrompt {
    bus: InteractionBus,
    interactive: bool,
}

impl TerminalPrompt {
    /// `interactive` is false when nobody can acknowledge, e.g. stdin is not a
    /// terminal.
    pub fn new(bus: InteractionBus, interactive: bool) -> Self {
        Self { bus, interactive }
    }
}

#[async_trait]
impl BlockingPrompt for TerminalPrompt {
    async fn alert(&self, message: &str) -> Result<(), ChannelError> {
        if !self.interactive {
            return Err(ChannelError::Unavailable("no interactive terminal".to_string()));
        }

        let mut rx = self.bus.subscribe();
        {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "\x07\n{}\n(press Enter to acknowledge)", message)
                .map_err(|e| ChannelError::Failed(format!("failed to write prompt: {}", e)))?;
        }

        match rx.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                debug!("Fallback prompt acknowledged");
                Ok(())
            }
            Err(RecvError::Closed) => Err(ChannelError::Failed("interaction feed closed".to_string())),
        }
    }
}

/// Publish one interaction per line read from `reader` until EOF or
/// cancellation.
pub fn spawn_interaction_feed<R>(
    reader: R,
    bus: InteractionBus,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(_)) => {
                        let reached = bus.publish(Interaction::now());
                        debug!(listeners = reached, "User interaction");
                    }
                    Ok(None) => {
                        debug!("Interaction feed reached end of input");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Interaction feed read failed");
                        break;
                    }
                },
            }
        }
    })
}

/// Publish one interaction per stdin line from a detached thread.
///
/// Blocking stdin reads cannot be interrupted, so the reader lives outside the
/// runtime and never holds up shutdown. It stops at EOF, on a read error, or
/// at the first line after `cancel` fired.
pub fn spawn_stdin_feed(bus: InteractionBus, cancel: CancellationToken) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("interaction-feed".to_string())
        .spawn(move || {
            use std::io::BufRead;

            for line in std::io::stdin().lock().lines() {
                if cancel.is_cancelled() {
                    break;
                }
                match line {
                    Ok(_) => {
                        let reached = bus.publish(Interaction::now());
                        debug!(listeners = reached, "User interaction");
                    }
                    Err(e) => {
                        warn!(error = %e, "Interaction feed read failed");
                        break;
                    }
                }
            }
        })
        .map(|_| ())
}
