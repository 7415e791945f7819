//! Notification permission held in process.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::alert::{PermissionProvider, PermissionState};

/// Permission seeded from configuration.
///
/// A request from `Default` resolves to `Granted` or `Denied` depending on
/// `grant_on_request`; an already decided state is never changed.
pub struct ConfiguredPermission {
    state: Mutex<PermissionState>,
    grant_on_request: bool,
}

impl ConfiguredPermission {
    pub fn new(initial: PermissionState, grant_on_request: bool) -> Self {
        Self {
            state: Mutex::new(initial),
            grant_on_request,
        }
    }
}

#[async_trait]
impl PermissionProvider for ConfiguredPermission {
    async fn query(&self) -> PermissionState {
        *self.state.lock()
    }

    async fn request(&self) -> PermissionState {
        let mut state = self.state.lock();
        if *state == PermissionState::Default {
            *state = if self.grant_on_request {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            info!(permission = %*state, "Notification permission decided");
        }
        *state
    }
}
