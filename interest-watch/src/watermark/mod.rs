//! Watermark persistence.
//!
//! The watermark is the highest interest event id the watcher has acted on.
//! [`WatermarkStore`] maps it onto a durable [`KeyValueStore`];
//! [`WatermarkTracker`] holds the in-memory authoritative copy and is the only
//! writer.

mod store;

pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::Result;

/// Storage key of the watermark.
pub const WATERMARK_KEY: &str = "lastInterestId";

/// Durable watermark storage on top of a key-value backend.
#[derive(Clone)]
pub struct WatermarkStore {
    backend: Arc<dyn KeyValueStore>,
}

impl WatermarkStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Read the persisted watermark; absent or malformed values read as 0.
    pub async fn read(&self) -> u64 {
        let Some(raw) = self.backend.get(WATERMARK_KEY).await else {
            return 0;
        };

        match raw.trim().parse::<u64>() {
            Ok(id) => id,
            Err(e) => {
                warn!(raw = %raw, error = %e, "Malformed persisted watermark, using 0");
                0
            }
        }
    }

    /// Persist `id`, overwriting whatever is stored.
    pub async fn write(&self, id: u64) -> Result<()> {
        self.backend.set(WATERMARK_KEY, &id.to_string()).await
    }
}

/// Result of offering a new id to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The id was strictly greater and is now the watermark.
    Advanced {
        previous: u64,
        current: u64,
        /// Whether the durable write succeeded.
        persisted: bool,
    },
    /// The id was not greater than the watermark; nothing changed.
    Stale { current: u64 },
}

impl Advance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// In-memory watermark backed by a [`WatermarkStore`].
///
/// The compare and the durable write happen under one async lock, so
/// concurrent callers offering the same id see exactly one `Advanced`.
/// Readers never wait on that lock.
pub struct WatermarkTracker {
    store: WatermarkStore,
    current: AtomicU64,
    advance_lock: Mutex<()>,
}

impl WatermarkTracker {
    /// Load the persisted watermark.
    pub async fn load(store: WatermarkStore) -> Self {
        let current = store.read().await;
        info!(watermark = current, "Loaded interest watermark");
        Self {
            store,
            current: AtomicU64::new(current),
            advance_lock: Mutex::new(()),
        }
    }

    /// Current watermark.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Move the watermark to `id` if it is strictly greater.
    ///
    /// A failed durable write is logged; the in-memory value still advances.
    pub async fn advance(&self, id: u64) -> Advance {
        let _guard = self.advance_lock.lock().await;

        let previous = self.current.load(Ordering::Acquire);
        if id <= previous {
            debug!(id, watermark = previous, "Ignoring stale id");
            return Advance::Stale { current: previous };
        }

        self.current.store(id, Ordering::Release);

        let persisted = match self.store.write(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id, error = %e, "Failed to persist watermark; keeping in-memory value");
                false
            }
        };

        Advance::Advanced {
            previous,
            current: id,
            persisted,
        }
    }
}
