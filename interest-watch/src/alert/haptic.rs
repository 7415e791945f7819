//! Haptic channel.

use std::time::Duration;

use async_trait::async_trait;

use super::ChannelError;

/// Default pulse pattern in milliseconds: on, off, on, off, on.
pub const DEFAULT_VIBRATION_PATTERN_MS: [u64; 5] = [500, 200, 500, 200, 1000];

/// A device vibration capability.
///
/// Hosts without one simply don't provide a `Vibrator`.
#[async_trait]
pub trait Vibrator: Send + Sync {
    /// Run `pattern`, alternating on and off segments starting with on.
    async fn vibrate(&self, pattern: &[Duration]) -> Result<(), ChannelError>;
}

/// Convert a millisecond pattern into durations.
pub(crate) fn pattern_from_millis(pattern_ms: &[u64]) -> Vec<Duration> {
    pattern_ms.iter().copied().map(Duration::from_millis).collect()
}
