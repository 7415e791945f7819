//! One poll-detect-escalate cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alert::{AlertBatch, AlertDispatcher, AlertReport};
use crate::poll::{PollClient, PollError};
use crate::watermark::{Advance, WatermarkTracker};

/// Where the watcher is in its cycle.
///
/// With overlapping cycles this is the furthest phase any in-flight cycle
/// has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Idle,
    Polling,
    Escalating,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Nothing newer than the watermark.
    NoChange,
    /// The watermark advanced and one alert burst fired.
    Escalated { latest_id: u64, report: AlertReport },
    /// The poll failed; watermark untouched, nothing dispatched.
    PollFailed(PollError),
}

/// Watcher counters.
#[derive(Debug, Default)]
pub struct WatcherStats {
    ticks: AtomicU64,
    skipped_ticks: AtomicU64,
    poll_failures: AtomicU64,
    escalations: AtomicU64,
    channel_failures: AtomicU64,
    persist_failures: AtomicU64,
}

/// Point-in-time copy of [`WatcherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherStatsSnapshot {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub poll_failures: u64,
    pub escalations: u64,
    pub channel_failures: u64,
    pub persist_failures: u64,
}

impl WatcherStats {
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }
}

/// Number of in-flight cycles per phase.
#[derive(Debug, Default)]
struct PhaseCounts {
    polling: AtomicUsize,
    escalating: AtomicUsize,
}

impl PhaseCounts {
    fn counter(&self, phase: WatcherState) -> Option<&AtomicUsize> {
        match phase {
            WatcherState::Idle => None,
            WatcherState::Polling => Some(&self.polling),
            WatcherState::Escalating => Some(&self.escalating),
        }
    }

    fn state(&self) -> WatcherState {
        if self.escalating.load(Ordering::Acquire) > 0 {
            WatcherState::Escalating
        } else if self.polling.load(Ordering::Acquire) > 0 {
            WatcherState::Polling
        } else {
            WatcherState::Idle
        }
    }
}

/// Phase of one cycle, released when the cycle ends or is dropped.
struct CyclePhase<'a> {
    counts: &'a PhaseCounts,
    phase: WatcherState,
}

impl<'a> CyclePhase<'a> {
    fn enter(counts: &'a PhaseCounts, phase: WatcherState) -> Self {
        if let Some(counter) = counts.counter(phase) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
        Self { counts, phase }
    }

    fn advance_to(&mut self, next: WatcherState) {
        if self.phase == next {
            return;
        }
        debug!(from = ?self.phase, to = ?next, "Cycle phase changed");
        if let Some(counter) = self.counts.counter(next) {
            counter.fetch_add(1, Ordering::AcqRel);
        }
        if let Some(counter) = self.counts.counter(self.phase) {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
        self.phase = next;
    }
}

impl Drop for CyclePhase<'_> {
    fn drop(&mut self) {
        if let Some(counter) = self.counts.counter(self.phase) {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Polls, advances the watermark and escalates.
pub struct InterestWatcher {
    poller: Arc<dyn PollClient>,
    watermark: WatermarkTracker,
    dispatcher: Arc<AlertDispatcher>,
    phases: PhaseCounts,
    stats: WatcherStats,
}

impl InterestWatcher {
    pub fn new(
        poller: Arc<dyn PollClient>,
        watermark: WatermarkTracker,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            poller,
            watermark,
            dispatcher,
            phases: PhaseCounts::default(),
            stats: WatcherStats::default(),
        }
    }

    pub fn state(&self) -> WatcherState {
        self.phases.state()
    }

    pub fn watermark(&self) -> u64 {
        self.watermark.current()
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    /// Run one cycle. Never fails: poll and channel errors end up in the
    /// outcome and the logs.
    pub async fn tick(&self) -> TickOutcome {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        let mut phase = CyclePhase::enter(&self.phases, WatcherState::Polling);

        let watermark = self.watermark.current();
        let result = match self.poller.poll(watermark).await {
            Ok(result) => result,
            Err(e) => {
                warn!(watermark, error = %e, "Polling for interests failed");
                self.stats.poll_failures.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::PollFailed(e);
            }
        };

        if !result.is_new_since(watermark) {
            debug!(
                watermark,
                has_new = result.has_new,
                latest_id = result.latest_id,
                "No new interests"
            );
            return TickOutcome::NoChange;
        }

        // An overlapping cycle may already have claimed this id.
        match self.watermark.advance(result.latest_id).await {
            Advance::Stale { current } => {
                debug!(latest_id = result.latest_id, current, "Batch already escalated");
                return TickOutcome::NoChange;
            }
            Advance::Advanced { persisted, .. } => {
                if !persisted {
                    self.stats.persist_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        info!(
            previous = watermark,
            latest_id = result.latest_id,
            count = result.new_count,
            "New interests detected"
        );

        phase.advance_to(WatcherState::Escalating);
        let batch = AlertBatch::new(result.latest_id, result.new_count);
        let report = self.dispatcher.fire(&batch).await;

        self.stats.escalations.fetch_add(1, Ordering::Relaxed);
        self.stats
            .channel_failures
            .fetch_add(report.failures() as u64, Ordering::Relaxed);
        drop(phase);

        TickOutcome::Escalated {
            latest_id: result.latest_id,
            report,
        }
    }
}
