//! Watcher configuration.
//!
//! Defaults cover everything but the service URL. Values are overridden from
//! `INTEREST_WATCH_*` environment variables (a `.env` file is honoured by the
//! binary).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::{AlertConfig, PermissionState};
use crate::host::HostConfig;
use crate::logging::{DEFAULT_LOG_FILTER, LogFormat};
use crate::poll::PollClientConfig;
use crate::scheduler::OverlapPolicy;
use crate::{Error, Result};

/// Prefix of every configuration environment variable.
pub const ENV_PREFIX: &str = "INTEREST_WATCH_";

/// Full watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll: PollClientConfig,
    /// Seconds between ticks.
    pub poll_interval_secs: u64,
    pub overlap: OverlapPolicy,
    /// JSON file holding the persisted watermark.
    pub state_file: PathBuf,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub alert: AlertConfig,
    pub host: HostConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll: PollClientConfig::default(),
            poll_interval_secs: 10,
            overlap: OverlapPolicy::Skip,
            state_file: PathBuf::from("interest-watch-state.json"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::Text,
            alert: AlertConfig::default(),
            host: HostConfig::default(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("{}: {}", key, e))),
    }
}

fn string_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(&format!("{}{}", ENV_PREFIX, name))
}

/// Split a command line on whitespace.
fn command_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Vec<String>>> {
    let Some(raw) = string_var(lookup, name) else {
        return Ok(None);
    };
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(Error::config(format!("{}{} is empty", ENV_PREFIX, name)));
    }
    Ok(Some(parts))
}

impl WatcherConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, on top of the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = string_var(&lookup, "BASE_URL") {
            config.poll.base_url = v;
        }
        if let Some(v) = string_var(&lookup, "POLL_PATH") {
            config.poll.poll_path = v;
        }
        if let Some(v) = parse_var(&lookup, "REQUEST_TIMEOUT_SECS")? {
            config.poll.timeout_secs = v;
        }
        if let Some(v) = string_var(&lookup, "SESSION_COOKIE") {
            config.poll.session_cookie = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "POLL_INTERVAL_SECS")? {
            config.poll_interval_secs = v;
        }
        if let Some(v) = parse_var::<OverlapPolicy>(&lookup, "OVERLAP")? {
            config.overlap = v;
        }
        if let Some(v) = string_var(&lookup, "STATE_FILE") {
            config.state_file = PathBuf::from(v);
        }
        if let Some(v) = string_var(&lookup, "LOG_FILTER") {
            config.log_filter = v;
        }
        if let Some(v) = parse_var::<LogFormat>(&lookup, "LOG_FORMAT")? {
            config.log_format = v;
        }

        let texts = &mut config.alert.texts;
        if let Some(v) = string_var(&lookup, "NOTIFICATION_TITLE") {
            texts.notification_title = v;
        }
        if let Some(v) = string_var(&lookup, "NOTIFICATION_BODY") {
            texts.notification_body = v;
        }
        if let Some(v) = string_var(&lookup, "NOTIFICATION_ICON") {
            texts.notification_icon = v;
        }
        if let Some(v) = string_var(&lookup, "FALLBACK_MESSAGE") {
            texts.fallback_message = v;
        }

        if let Some(v) = parse_var::<PermissionState>(&lookup, "NOTIFICATION_PERMISSION")? {
            config.host.notification_permission = v;
        }
        if let Some(v) = parse_var(&lookup, "GRANT_ON_REQUEST")? {
            config.host.grant_on_request = v;
        }
        if let Some(v) = command_var(&lookup, "SOUND_PLAYER")? {
            config.host.sound_player = v;
        }
        if let Some(v) = command_var(&lookup, "NOTIFY_COMMAND")? {
            config.host.notify_command = v;
        }
        if let Some(v) = parse_var(&lookup, "SAMPLE_RATE")? {
            config.host.sample_rate = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("poll interval must be at least one second"));
        }
        self.poll.endpoint()?;
        self.poll.timeout()?;
        self.alert.tone.validate().map_err(Error::config)?;
        if self.host.sample_rate == 0 {
            return Err(Error::config("sample rate must be positive"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
