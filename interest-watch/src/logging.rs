//! Logging setup.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and a local-time
//! formatter, writing either human-readable lines or one JSON object per
//! event. `RUST_LOG` wins over the configured directive when set.

use chrono::Local;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, MakeWriter, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "interest_watch=info,reqwest=warn";

/// Output format of log events.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log collectors.
    Json,
}

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Build the filter from `RUST_LOG`, falling back to `directive`.
pub fn build_filter(directive: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive)
            .map_err(|e| Error::Other(format!("Invalid filter directive: {}", e))),
    }
}

/// Formatting layer for `format` writing to `writer`.
fn fmt_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer()
            .with_timer(LocalTimer)
            .with_target(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_timer(LocalTimer)
            .with_target(true)
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
    }
}

/// Initialize the global subscriber.
///
/// Fails if a global subscriber is already installed or the directive does
/// not parse.
pub fn init_logging(directive: &str, format: LogFormat) -> Result<()> {
    let filter = build_filter(directive)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(format, std::io::stdout))
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to install subscriber: {}", e)))
}
