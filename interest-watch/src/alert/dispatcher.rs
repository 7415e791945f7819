//! Alert dispatcher.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::audio::{SharedSoundEngine, SoundEngineFactory, ToneSpec};
use super::haptic::{DEFAULT_VIBRATION_PATTERN_MS, Vibrator, pattern_from_millis};
use super::notification::{
    BlockingPrompt, Notifier, PermissionProvider, PermissionState, VisualNotification,
};
use super::{
    AlertBatch, AlertReport, AlertTexts, ChannelError, ChannelKind, ChannelOutcome,
    render_template,
};

/// Alert dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub tone: ToneSpec,
    /// On/off pulse pattern in milliseconds.
    pub vibration_pattern_ms: Vec<u64>,
    pub texts: AlertTexts,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            tone: ToneSpec::default(),
            vibration_pattern_ms: DEFAULT_VIBRATION_PATTERN_MS.to_vec(),
            texts: AlertTexts::default(),
        }
    }
}

/// Host capabilities the dispatcher drives.
pub struct AlertChannels {
    pub sound: Arc<dyn SoundEngineFactory>,
    /// `None` when the host has no vibration capability.
    pub vibrator: Option<Arc<dyn Vibrator>>,
    pub permission: Arc<dyn PermissionProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub prompt: Arc<dyn BlockingPrompt>,
}

/// Fires one alert burst per detected batch.
pub struct AlertDispatcher {
    sound: SharedSoundEngine,
    vibrator: Option<Arc<dyn Vibrator>>,
    permission: Arc<dyn PermissionProvider>,
    notifier: Arc<dyn Notifier>,
    prompt: Arc<dyn BlockingPrompt>,
    tone: ToneSpec,
    vibration_pattern: Vec<Duration>,
    texts: AlertTexts,
}

impl AlertDispatcher {
    pub fn new(channels: AlertChannels, config: AlertConfig) -> Self {
        Self {
            sound: SharedSoundEngine::new(channels.sound),
            vibrator: channels.vibrator,
            permission: channels.permission,
            notifier: channels.notifier,
            prompt: channels.prompt,
            tone: config.tone,
            vibration_pattern: pattern_from_millis(&config.vibration_pattern_ms),
            texts: config.texts,
        }
    }

    /// Ask for notification permission if the user has not decided yet.
    ///
    /// Meant to run once at startup, never per tick.
    pub async fn request_permission_if_default(&self) -> PermissionState {
        let state = self.permission.query().await;
        if state != PermissionState::Default {
            debug!(permission = %state, "Notification permission already decided");
            return state;
        }

        let state = self.permission.request().await;
        info!(permission = %state, "Requested notification permission");
        state
    }

    /// Create (or resume) the shared sound engine ahead of the first alert.
    pub async fn unlock_audio(&self) -> Result<(), ChannelError> {
        self.sound.ready().await.map(|_| ())
    }

    pub fn audio_unlocked(&self) -> bool {
        self.sound.is_initialized()
    }

    /// Fire every channel for `batch`, in order. Never fails; the report
    /// records what each channel did.
    pub async fn fire(&self, batch: &AlertBatch) -> AlertReport {
        info!(
            latest_id = batch.latest_id,
            count = batch.count,
            "Escalating new interest alert"
        );

        let mut report = AlertReport::new(*batch);

        let audio = self.sound.play(&self.tone).await;
        self.record(&mut report, ChannelKind::Audio, audio.into());

        let haptic = self.vibrate().await;
        self.record(&mut report, ChannelKind::Haptic, haptic.into());

        let permission = self.permission.query().await;
        if permission.is_granted() {
            let visual = self.notifier.show(&self.notification_for(batch)).await;
            self.record(&mut report, ChannelKind::VisualNotification, visual.into());
            self.record(&mut report, ChannelKind::BlockingFallback, ChannelOutcome::NotApplicable);
        } else {
            let unavailable =
                ChannelError::Unavailable(format!("notification permission is {}", permission));
            self.record(
                &mut report,
                ChannelKind::VisualNotification,
                ChannelOutcome::Error(unavailable),
            );

            let message = render_template(&self.texts.fallback_message, batch.count);
            let fallback = self.prompt.alert(&message).await;
            self.record(&mut report, ChannelKind::BlockingFallback, fallback.into());
        }

        report
    }

    async fn vibrate(&self) -> Result<(), ChannelError> {
        let Some(vibrator) = &self.vibrator else {
            return Err(ChannelError::Unavailable("no vibration capability".to_string()));
        };
        vibrator.vibrate(&self.vibration_pattern).await
    }

    fn notification_for(&self, batch: &AlertBatch) -> VisualNotification {
        VisualNotification {
            title: render_template(&self.texts.notification_title, batch.count),
            body: render_template(&self.texts.notification_body, batch.count),
            icon: self.texts.notification_icon.clone(),
        }
    }

    fn record(&self, report: &mut AlertReport, channel: ChannelKind, outcome: ChannelOutcome) {
        match &outcome {
            ChannelOutcome::Delivered => debug!(%channel, "Alert channel delivered"),
            ChannelOutcome::NotApplicable => debug!(%channel, "Alert channel not applicable"),
            ChannelOutcome::Error(ChannelError::Unavailable(reason)) => {
                debug!(%channel, reason = %reason, "Alert channel unavailable")
            }
            ChannelOutcome::Error(ChannelError::Failed(reason)) => {
                warn!(%channel, reason = %reason, "Alert channel failed")
            }
        }
        report.record(channel, outcome);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alert::audio::tests::{FakeEngine, FakeFactory};
    use crate::alert::audio::EngineState;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FakePermission {
        pub state: Mutex<PermissionState>,
        pub on_request: PermissionState,
        pub requests: AtomicUsize,
    }

    impl FakePermission {
        pub fn new(state: PermissionState) -> Self {
            Self {
                state: Mutex::new(state),
                on_request: PermissionState::Granted,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PermissionProvider for FakePermission {
        async fn query(&self) -> PermissionState {
            *self.state.lock()
        }

        async fn request(&self) -> PermissionState {
            self.requests.fetch_add(1, Ordering::SeqCst);
            *self.state.lock() = self.on_request;
            self.on_request
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeNotifier {
        pub shown: Mutex<Vec<VisualNotification>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn show(&self, notification: &VisualNotification) -> Result<(), ChannelError> {
            self.shown.lock().push(notification.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakePrompt {
        pub messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlockingPrompt for FakePrompt {
        async fn alert(&self, message: &str) -> Result<(), ChannelError> {
            self.messages.lock().push(message.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeVibrator {
        pub patterns: Mutex<Vec<Vec<Duration>>>,
    }

    #[async_trait]
    impl Vibrator for FakeVibrator {
        async fn vibrate(&self, pattern: &[Duration]) -> Result<(), ChannelError> {
            self.patterns.lock().push(pattern.to_vec());
            Ok(())
        }
    }

    pub(crate) struct Harness {
        pub factory: Arc<FakeFactory>,
        pub vibrator: Arc<FakeVibrator>,
        pub permission: Arc<FakePermission>,
        pub notifier: Arc<FakeNotifier>,
        pub prompt: Arc<FakePrompt>,
    }

    impl Harness {
        pub fn new(engine: FakeEngine, permission: PermissionState) -> Self {
            Self {
                factory: Arc::new(FakeFactory::new(engine)),
                vibrator: Arc::new(FakeVibrator::default()),
                permission: Arc::new(FakePermission::new(permission)),
                notifier: Arc::new(FakeNotifier::default()),
                prompt: Arc::new(FakePrompt::default()),
            }
        }

        pub fn dispatcher(&self, with_vibrator: bool) -> AlertDispatcher {
            let vibrator: Option<Arc<dyn Vibrator>> = if with_vibrator {
                Some(self.vibrator.clone())
            } else {
                None
            };
            AlertDispatcher::new(
                AlertChannels {
                    sound: self.factory.clone(),
                    vibrator,
                    permission: self.permission.clone(),
                    notifier: self.notifier.clone(),
                    prompt: self.prompt.clone(),
                },
                AlertConfig::default(),
            )
        }
    }

    #[tokio::test]
    async fn test_granted_permission_shows_notification_only() {
        let harness = Harness::new(FakeEngine::new(EngineState::Running), PermissionState::Granted);
        let dispatcher = harness.dispatcher(true);

        let report = dispatcher.fire(&AlertBatch::new(15, 3)).await;

        assert!(report.delivered(ChannelKind::Audio));
        assert!(report.delivered(ChannelKind::Haptic));
        assert!(report.delivered(ChannelKind::VisualNotification));
        assert_eq!(
            report.outcome(ChannelKind::BlockingFallback),
            Some(&ChannelOutcome::NotApplicable)
        );

        let shown = harness.notifier.shown.lock();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "You have 3 person(s) interested in your offers.");
        assert_eq!(shown[0].icon, "/static/img/logo.png");
        assert!(harness.prompt.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_denied_or_default_permission_uses_fallback() {
        for permission in [PermissionState::Denied, PermissionState::Default] {
            let harness = Harness::new(FakeEngine::new(EngineState::Running), permission);
            let dispatcher = harness.dispatcher(false);

            let report = dispatcher.fire(&AlertBatch::new(15, 3)).await;

            assert!(matches!(
                report.outcome(ChannelKind::VisualNotification),
                Some(ChannelOutcome::Error(ChannelError::Unavailable(_)))
            ));
            assert!(report.delivered(ChannelKind::BlockingFallback));
            assert!(harness.notifier.shown.lock().is_empty());
            assert_eq!(
                harness.prompt.messages.lock().as_slice(),
                ["ALERT! You have 3 new interested person(s).".to_string()]
            );
        }
    }

    #[tokio::test]
    async fn test_audio_failure_does_not_block_other_channels() {
        let mut engine = FakeEngine::new(EngineState::Suspended);
        engine.resume_fails = true;
        let harness = Harness::new(engine, PermissionState::Granted);
        let dispatcher = harness.dispatcher(true);

        let report = dispatcher.fire(&AlertBatch::new(2, 1)).await;

        assert!(matches!(
            report.outcome(ChannelKind::Audio),
            Some(ChannelOutcome::Error(ChannelError::Failed(_)))
        ));
        assert_eq!(harness.vibrator.patterns.lock().len(), 1);
        assert_eq!(harness.notifier.shown.lock().len(), 1);
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn test_missing_vibration_is_silent_noop() {
        let harness = Harness::new(FakeEngine::new(EngineState::Running), PermissionState::Denied);
        let dispatcher = harness.dispatcher(false);

        let report = dispatcher.fire(&AlertBatch::new(2, 1)).await;

        assert!(matches!(
            report.outcome(ChannelKind::Haptic),
            Some(ChannelOutcome::Error(ChannelError::Unavailable(_)))
        ));
        assert_eq!(report.failures(), 0);
        assert_eq!(report.attempts.len(), 4);
    }

    #[tokio::test]
    async fn test_vibration_pattern() {
        let harness = Harness::new(FakeEngine::new(EngineState::Running), PermissionState::Granted);
        harness.dispatcher(true).fire(&AlertBatch::new(1, 1)).await;

        let patterns = harness.vibrator.patterns.lock();
        let millis: Vec<u128> = patterns[0].iter().map(|d| d.as_millis()).collect();
        assert_eq!(millis, vec![500, 200, 500, 200, 1000]);
    }

    #[tokio::test]
    async fn test_permission_requested_only_when_default() {
        let harness = Harness::new(FakeEngine::new(EngineState::Running), PermissionState::Default);
        let dispatcher = harness.dispatcher(false);

        assert_eq!(dispatcher.request_permission_if_default().await, PermissionState::Granted);
        assert_eq!(dispatcher.request_permission_if_default().await, PermissionState::Granted);
        assert_eq!(harness.permission.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unlock_audio_creates_engine_once() {
        let harness = Harness::new(FakeEngine::new(EngineState::Suspended), PermissionState::Granted);
        let dispatcher = harness.dispatcher(false);
        assert!(!dispatcher.audio_unlocked());

        dispatcher.unlock_audio().await.unwrap();
        dispatcher.fire(&AlertBatch::new(1, 1)).await;

        assert!(dispatcher.audio_unlocked());
        assert_eq!(harness.factory.creations.load(Ordering::SeqCst), 1);
        assert_eq!(harness.factory.engine.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(harness.factory.engine.plays.load(Ordering::SeqCst), 1);
    }
}
