//! Native host adapters for the alert channels.
//!
//! - Sound: renders the tone to WAV and runs an external player
//! - Visual notification: runs `notify-send` (or a configured equivalent)
//! - Permission: seeded from configuration, decided once on request
//! - Blocking fallback: terminal bell plus a wait for Enter
//!
//! A terminal host has no vibration hardware, so the haptic channel is left
//! unwired.

mod notify;
mod permission;
mod prompt;
mod sound;

pub use notify::CommandNotifier;
pub use permission::ConfiguredPermission;
pub use prompt::{TerminalPrompt, spawn_interaction_feed, spawn_stdin_feed};
pub use sound::{CommandSoundEngine, CommandSoundFactory, encode_wav};

use std::sync::Arc;

use process_utils::ProcessError;
use serde::{Deserialize, Serialize};

use crate::alert::{AlertChannels, ChannelError, PermissionState};
use crate::interaction::InteractionBus;

/// Host adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Permission state at startup.
    pub notification_permission: PermissionState,
    /// Outcome of the startup permission request when undecided.
    pub grant_on_request: bool,
    /// Player command; the WAV path is appended.
    pub sound_player: Vec<String>,
    pub notify_command: Vec<String>,
    pub sample_rate: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            notification_permission: PermissionState::Default,
            grant_on_request: true,
            sound_player: vec!["aplay".to_string(), "-q".to_string()],
            notify_command: vec!["notify-send".to_string()],
            sample_rate: 44_100,
        }
    }
}

impl From<ProcessError> for ChannelError {
    fn from(e: ProcessError) -> Self {
        if e.is_unavailable() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Failed(e.to_string())
        }
    }
}

impl HostConfig {
    /// Wire the command-backed channels.
    ///
    /// `interactive` tells the fallback prompt whether anyone can acknowledge
    /// it from the terminal.
    pub fn channels(&self, bus: &InteractionBus, interactive: bool) -> AlertChannels {
        AlertChannels {
            sound: Arc::new(CommandSoundFactory::new(
                self.sound_player.clone(),
                self.sample_rate,
            )),
            vibrator: None,
            permission: Arc::new(ConfiguredPermission::new(
                self.notification_permission,
                self.grant_on_request,
            )),
            notifier: Arc::new(CommandNotifier::new(self.notify_command.clone())),
            prompt: Arc::new(TerminalPrompt::new(bus.clone(), interactive)),
        }
    }
}
