//! Alert escalation.
//!
//! One detected batch of interest events produces one alert burst: a fixed,
//! ordered sequence of channel attempts.
//!
//! 1. Audio: always attempted, through the shared sound engine
//! 2. Haptic: only when a vibration capability exists
//! 3. Visual notification: only when notification permission is granted
//! 4. Blocking fallback: only when notification permission is not granted
//!
//! Each attempt is independent; failures are recorded in the [`AlertReport`]
//! and never stop the remaining channels.

mod audio;
mod dispatcher;
mod haptic;
mod notification;

pub use audio::{EngineState, SharedSoundEngine, SoundEngine, SoundEngineFactory, ToneSpec, Waveform};
pub use dispatcher::{AlertChannels, AlertConfig, AlertDispatcher};
pub use haptic::{DEFAULT_VIBRATION_PATTERN_MS, Vibrator};
pub use notification::{
    BlockingPrompt, Notifier, PermissionProvider, PermissionState, VisualNotification,
};


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel failure. Never propagated past the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The capability is absent or permission is denied.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    /// The attempt was made and failed.
    #[error("channel failed: {0}")]
    Failed(String),
}

/// The alert channels, in dispatch order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Audio,
    Haptic,
    VisualNotification,
    BlockingFallback,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A detected batch of new interest events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertBatch {
    /// Highest event id in the batch.
    pub latest_id: u64,
    /// Number of new events.
    pub count: u64,
    pub detected_at: DateTime<Utc>,
}

impl AlertBatch {
    pub fn new(latest_id: u64, count: u64) -> Self {
        Self {
            latest_id,
            count,
            detected_at: Utc::now(),
        }
    }
}

/// What happened to one channel during a burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    /// The channel's counterpart handled this burst.
    NotApplicable,
    Error(ChannelError),
}

impl From<Result<(), ChannelError>> for ChannelOutcome {
    fn from(result: Result<(), ChannelError>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Error(e),
        }
    }
}

/// Per-channel record of one alert burst.
#[derive(Debug, Clone)]
pub struct AlertReport {
    pub batch: AlertBatch,
    pub attempts: Vec<(ChannelKind, ChannelOutcome)>,
}

impl AlertReport {
    fn new(batch: AlertBatch) -> Self {
        Self {
            batch,
            attempts: Vec::with_capacity(4),
        }
    }

    fn record(&mut self, channel: ChannelKind, outcome: ChannelOutcome) {
        self.attempts.push((channel, outcome));
    }

    pub fn outcome(&self, channel: ChannelKind) -> Option<&ChannelOutcome> {
        self.attempts
            .iter()
            .find(|(kind, _)| *kind == channel)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered(&self, channel: ChannelKind) -> bool {
        matches!(self.outcome(channel), Some(ChannelOutcome::Delivered))
    }

    /// Number of attempts that were made and failed.
    pub fn failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ChannelOutcome::Error(ChannelError::Failed(_))))
            .count()
    }
}

/// User-facing alert texts. `{count}` is replaced with the batch size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertTexts {
    pub notification_title: String,
    pub notification_body: String,
    pub notification_icon: String,
    pub fallback_message: String,
}

impl Default for AlertTexts {
    fn default() -> Self {
        Self {
            notification_title: "New interest in your offers!".to_string(),
            notification_body: "You have {count} person(s) interested in your offers.".to_string(),
            notification_icon: "/static/img/logo.png".to_string(),
            fallback_message: "ALERT! You have {count} new interested person(s).".to_string(),
        }
    }
}

/// Substitute `{count}` in `template`.
pub fn render_template(template: &str, count: u64) -> String {
    template.replace("{count}", &count.to_string())
}
