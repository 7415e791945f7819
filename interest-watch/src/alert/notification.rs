//! Visual notification and blocking fallback channels.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ChannelError;

/// Notification permission as reported by the host.
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
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not decided yet.
    #[default]
    Default,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Host notification permission, queried live on every alert.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn query(&self) -> PermissionState;

    /// Ask the user for permission. Returns the resulting state.
    async fn request(&self) -> PermissionState;
}

/// Content of a visual notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

/// Shows visual notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &VisualNotification) -> Result<(), ChannelError>;
}

/// A user-must-acknowledge alert.
///
/// `alert` resolves once the user acknowledged the message.
#[async_trait]
pub trait BlockingPrompt: Send + Sync {
    async fn alert(&self, message: &str) -> Result<(), ChannelError>;
}
