//! The repeating scheduler task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ticker::Ticker;
use super::watcher::{InterestWatcher, TickOutcome};

/// What to do with a tick while the previous cycle is still running.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the tick.
    #[default]
    Skip,
    /// Start another cycle; the watermark guard prevents double alerts.
    Allow,
}

/// Clears the in-flight flag when a cycle ends, including on abort.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives [`InterestWatcher::tick`] from a [`Ticker`].
///
/// Every cycle runs in its own task, so a slow poll or a blocking alert never
/// delays the next tick.
pub struct Scheduler {
    watcher: Arc<InterestWatcher>,
    overlap: OverlapPolicy,
    in_flight: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(watcher: Arc<InterestWatcher>, overlap: OverlapPolicy) -> Self {
        Self {
            watcher,
            overlap,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn watcher(&self) -> &Arc<InterestWatcher> {
        &self.watcher
    }

    /// Run until `cancel` fires or the ticker is exhausted.
    ///
    /// On cancellation in-flight cycles are aborted. When the ticker ends,
    /// in-flight cycles are awaited.
    pub async fn run<T: Ticker>(&self, mut ticker: T, cancel: CancellationToken) {
        info!(overlap = ?self.overlap, "Interest scheduler started");
        let mut cycles: JoinSet<TickOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Interest scheduler cancelled");
                    cycles.shutdown().await;
                    return;
                }

                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    Self::log_cycle(joined);
                }

                more = ticker.tick() => {
                    if !more {
                        debug!("Ticker exhausted");
                        break;
                    }
                    self.start_cycle(&mut cycles);
                }
            }
        }

        while let Some(joined) = cycles.join_next().await {
            Self::log_cycle(joined);
        }
        info!("Interest scheduler stopped");
    }

    fn start_cycle(&self, cycles: &mut JoinSet<TickOutcome>) {
        let guard = match self.overlap {
            OverlapPolicy::Allow => None,
            OverlapPolicy::Skip => {
                if self
                    .in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    debug!("Previous cycle still running, skipping tick");
                    self.watcher.stats().record_skipped();
                    return;
                }
                Some(InFlightGuard(self.in_flight.clone()))
            }
        };

        let watcher = self.watcher.clone();
        cycles.spawn(async move {
            let _guard = guard;
            watcher.tick().await
        });
    }

    fn log_cycle(joined: Result<TickOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(TickOutcome::Escalated { latest_id, report }) => {
                debug!(latest_id, failures = report.failures(), "Cycle escalated")
            }
            Ok(_) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Cycle task panicked"),
        }
    }
}
