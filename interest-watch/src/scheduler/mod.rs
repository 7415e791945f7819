//! Scheduler loop.
//!
//! The scheduler is responsible for:
//! - Ticking on a fixed period, first tick immediately
//! - Running each poll-detect-escalate cycle independently of the others
//! - The one-time audio unlock on first user interaction
//! - Stopping on the shutdown signal
//!
//! Per cycle the watcher moves Idle → Polling → (new id) Escalating → Idle,
//! or Polling → Idle on failure or when nothing is new. With overlapping
//! cycles the reported state is the furthest phase any of them has reached.

mod runner;
mod shutdown;
mod ticker;
mod unlock;
mod watcher;

pub use runner::{OverlapPolicy, Scheduler};
pub use shutdown::spawn_shutdown_listener;
pub use ticker::{IntervalTicker, ManualTicker, TickHandle, Ticker};
pub use unlock::spawn_unlock_hook;
pub use watcher::{InterestWatcher, TickOutcome, WatcherState, WatcherStats, WatcherStatsSnapshot};
