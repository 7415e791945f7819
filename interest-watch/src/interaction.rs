//! User interaction events.
//!
//! The host publishes every user interaction here. The audio unlock hook and
//! the terminal fallback prompt subscribe.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Broadcast channel capacity for interaction events.
const INTERACTION_CAPACITY: usize = 16;

/// A single user interaction.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub at: DateTime<Utc>,
}

impl Interaction {
    pub fn now() -> Self {
        Self { at: Utc::now() }
    }
}

/// Fan-out of user interactions.
#[derive(Debug, Clone)]
pub struct InteractionBus {
    tx: broadcast::Sender<Interaction>,
}

impl Default for InteractionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(INTERACTION_CAPACITY);
        Self { tx }
    }

    /// Publish an interaction. Returns the number of listeners reached.
    pub fn publish(&self, interaction: Interaction) -> usize {
        // No subscribers is fine
        self.tx.send(interaction).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Interaction> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_listeners() {
        let bus = InteractionBus::new();
        assert_eq!(bus.publish(Interaction::now()), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = InteractionBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.listeners(), 1);
        assert_eq!(bus.publish(Interaction::now()), 1);
        assert!(rx.recv().await.is_ok());
    }
}
