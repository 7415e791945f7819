//! Tick sources.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of scheduler ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. Returns `false` once the source is exhausted.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. The first tick fires immediately.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven by hand through a [`TickHandle`].
///
/// Exhausted once every handle is dropped.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Triggers ticks on a [`ManualTicker`].
#[derive(Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, TickHandle { tx })
    }
}

impl TickHandle {
    /// Queue one tick. Returns `false` if the ticker is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}
