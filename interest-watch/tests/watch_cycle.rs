//! End-to-end watch cycles with recording channel doubles and a real state
//! file.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use interest_watch::alert::{
    AlertChannels, AlertConfig, AlertDispatcher, BlockingPrompt, ChannelError, ChannelKind,
    ChannelOutcome, EngineState, Notifier, PermissionProvider, PermissionState, SoundEngine,
    SoundEngineFactory, ToneSpec, Vibrator, VisualNotification,
};
use interest_watch::poll::{PollClient, PollError, PollResult};
use interest_watch::scheduler::{
    InterestWatcher, ManualTicker, OverlapPolicy, Scheduler, TickOutcome,
};
use interest_watch::watermark::{JsonFileStore, WatermarkStore, WatermarkTracker};

/// Replays scripted results, then reports nothing new.
struct ScriptedServer {
    script: Mutex<VecDeque<Result<PollResult, PollError>>>,
    seen: Mutex<Vec<u64>>,
}

impl ScriptedServer {
    fn new(script: Vec<Result<PollResult, PollError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PollClient for ScriptedServer {
    async fn poll(&self, watermark: u64) -> Result<PollResult, PollError> {
        self.seen.lock().push(watermark);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PollResult::nothing_new()))
    }
}

fn batch(latest_id: u64, new_count: u64) -> Result<PollResult, PollError> {
    Ok(PollResult {
        has_new: true,
        latest_id,
        new_count,
    })
}

#[derive(Default)]
struct Recorder {
    tones: AtomicUsize,
    engines: AtomicUsize,
    vibrations: Mutex<Vec<Vec<Duration>>>,
    notifications: Mutex<Vec<VisualNotification>>,
    prompts: Mutex<Vec<String>>,
}

struct RecordingEngine(Arc<Recorder>);

#[async_trait]
impl SoundEngine for RecordingEngine {
    fn state(&self) -> EngineState {
        EngineState::Running
    }

    async fn resume(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn play(&self, _tone: &ToneSpec) -> Result<(), ChannelError> {
        self.0.tones.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct RecordingFactory(Arc<Recorder>);

impl SoundEngineFactory for RecordingFactory {
    fn create(&self) -> Result<Arc<dyn SoundEngine>, ChannelError> {
        self.0.engines.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingEngine(self.0.clone())))
    }
}

struct RecordingChannels {
    recorder: Arc<Recorder>,
    permission: PermissionState,
}

#[async_trait]
impl Vibrator for RecordingChannels {
    async fn vibrate(&self, pattern: &[Duration]) -> Result<(), ChannelError> {
        self.recorder.vibrations.lock().push(pattern.to_vec());
        Ok(())
    }
}

#[async_trait]
impl PermissionProvider for RecordingChannels {
    async fn query(&self) -> PermissionState {
        self.permission
    }

    async fn request(&self) -> PermissionState {
        self.permission
    }
}

#[async_trait]
impl Notifier for RecordingChannels {
    async fn show(&self, notification: &VisualNotification) -> Result<(), ChannelError> {
        self.recorder.notifications.lock().push(notification.clone());
        Ok(())
    }
}

#[async_trait]
impl BlockingPrompt for RecordingChannels {
    async fn alert(&self, message: &str) -> Result<(), ChannelError> {
        self.recorder.prompts.lock().push(message.to_string());
        Ok(())
    }
}

fn dispatcher(recorder: &Arc<Recorder>, permission: PermissionState) -> Arc<AlertDispatcher> {
    let host = Arc::new(RecordingChannels {
        recorder: recorder.clone(),
        permission,
    });
    let channels = AlertChannels {
        sound: Arc::new(RecordingFactory(recorder.clone())),
        vibrator: Some(host.clone()),
        permission: host.clone(),
        notifier: host.clone(),
        prompt: host,
    };
    Arc::new(AlertDispatcher::new(channels, AlertConfig::default()))
}

async fn tracker(path: &std::path::Path) -> WatermarkTracker {
    WatermarkTracker::load(WatermarkStore::new(Arc::new(JsonFileStore::new(path)))).await
}

#[tokio::test]
async fn test_first_batch_escalates_once_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state").join("watch.json");
    let recorder = Arc::new(Recorder::default());

    let server = Arc::new(ScriptedServer::new(vec![batch(5, 2), batch(5, 2)]));
    let watcher = InterestWatcher::new(
        server.clone(),
        tracker(&state_file).await,
        dispatcher(&recorder, PermissionState::Granted),
    );

    let outcome = watcher.tick().await;
    let TickOutcome::Escalated { latest_id, report } = outcome else {
        panic!("expected an escalation");
    };
    assert_eq!(latest_id, 5);
    assert!(report.delivered(ChannelKind::Audio));
    assert!(report.delivered(ChannelKind::Haptic));
    assert!(report.delivered(ChannelKind::VisualNotification));
    assert_eq!(
        report.outcome(ChannelKind::BlockingFallback),
        Some(&ChannelOutcome::NotApplicable)
    );

    // Same batch again: nothing new
    assert!(matches!(watcher.tick().await, TickOutcome::NoChange));
    assert_eq!(*server.seen.lock(), vec![0, 5]);

    // Restart with a fresh tracker over the same file
    let restarted_server = Arc::new(ScriptedServer::new(vec![batch(5, 2)]));
    let restarted = InterestWatcher::new(
        restarted_server.clone(),
        tracker(&state_file).await,
        dispatcher(&recorder, PermissionState::Granted),
    );
    assert_eq!(restarted.watermark(), 5);
    assert!(matches!(restarted.tick().await, TickOutcome::NoChange));
    assert_eq!(*restarted_server.seen.lock(), vec![5]);

    assert_eq!(recorder.tones.load(Ordering::SeqCst), 1);
    let notifications = recorder.notifications.lock();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].body,
        "You have 2 person(s) interested in your offers."
    );
    assert!(recorder.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_denied_permission_uses_fallback_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let server = Arc::new(ScriptedServer::new(vec![batch(9, 3)]));
    let watcher = InterestWatcher::new(
        server,
        tracker(&dir.path().join("watch.json")).await,
        dispatcher(&recorder, PermissionState::Denied),
    );

    let TickOutcome::Escalated { report, .. } = watcher.tick().await else {
        panic!("expected an escalation");
    };
    assert!(matches!(
        report.outcome(ChannelKind::VisualNotification),
        Some(ChannelOutcome::Error(ChannelError::Unavailable(_)))
    ));
    assert!(report.delivered(ChannelKind::BlockingFallback));
    assert_eq!(
        *recorder.prompts.lock(),
        vec!["ALERT! You have 3 new interested person(s).".to_string()]
    );
    assert!(recorder.notifications.lock().is_empty());
    assert_eq!(
        recorder.vibrations.lock()[0],
        [500, 200, 500, 200, 1000].map(Duration::from_millis).to_vec()
    );
}

#[tokio::test]
async fn test_scheduler_survives_failures_and_keeps_one_engine() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("watch.json");
    let recorder = Arc::new(Recorder::default());
    let server = Arc::new(ScriptedServer::new(vec![
        Err(PollError::Transport("connection refused".to_string())),
        batch(3, 3),
        Err(PollError::Decode("missing field `has_new`".to_string())),
        batch(3, 3),
        batch(7, 4),
    ]));
    let watcher = Arc::new(InterestWatcher::new(
        server.clone(),
        tracker(&state_file).await,
        dispatcher(&recorder, PermissionState::Granted),
    ));
    let scheduler = Scheduler::new(watcher.clone(), OverlapPolicy::Skip);
    let (ticker, handle) = ManualTicker::new();
    let run = tokio::spawn(async move { scheduler.run(ticker, CancellationToken::new()).await });

    for _ in 0..5 {
        // One cycle at a time so none is skipped
        let before = watcher.stats().snapshot().ticks;
        handle.tick();
        tokio::time::timeout(Duration::from_secs(5), async {
            while watcher.stats().snapshot().ticks == before
                || watcher.state() != interest_watch::scheduler::WatcherState::Idle
            {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cycle did not finish");
    }
    drop(handle);
    run.await.unwrap();

    let stats = watcher.stats().snapshot();
    assert_eq!(stats.ticks, 5);
    assert_eq!(stats.poll_failures, 2);
    assert_eq!(stats.escalations, 2);
    assert_eq!(watcher.watermark(), 7);
    assert_eq!(tracker(&state_file).await.current(), 7);

    assert_eq!(recorder.engines.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.tones.load(Ordering::SeqCst), 2);
    assert_eq!(*server.seen.lock(), vec![0, 0, 3, 3, 3]);
}
