//! interest-watch library crate.
//!
//! Polls a service for new interest events, keeps a durable watermark of the
//! last event seen, and escalates every new batch through the local alert
//! channels.

pub mod alert;
pub mod config;
pub mod error;
pub mod host;
pub mod interaction;
pub mod logging;
pub mod poll;
pub mod scheduler;
pub mod watermark;

pub use error::{Error, Result};
