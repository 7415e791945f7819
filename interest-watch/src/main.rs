use std::io::IsTerminal;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use interest_watch::alert::AlertDispatcher;
use interest_watch::config::WatcherConfig;
use interest_watch::host::spawn_stdin_feed;
use interest_watch::interaction::InteractionBus;
use interest_watch::logging::init_logging;
use interest_watch::poll::HttpPollClient;
use interest_watch::scheduler::{
    InterestWatcher, IntervalTicker, Scheduler, spawn_shutdown_listener, spawn_unlock_hook,
};
use interest_watch::watermark::{JsonFileStore, WatermarkStore, WatermarkTracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = WatcherConfig::from_env()?;
    init_logging(&config.log_filter, config.log_format)?;

    let store = WatermarkStore::new(Arc::new(JsonFileStore::new(&config.state_file)));
    let tracker = WatermarkTracker::load(store).await;
    info!(
        watermark = tracker.current(),
        state_file = %config.state_file.display(),
        "Watermark loaded"
    );

    let poller = Arc::new(HttpPollClient::new(&config.poll)?);
    info!(endpoint = %poller.endpoint(), "Polling endpoint configured");

    let bus = InteractionBus::new();
    let interactive = std::io::stdin().is_terminal();
    let dispatcher = Arc::new(AlertDispatcher::new(
        config.host.channels(&bus, interactive),
        config.alert.clone(),
    ));
    dispatcher.request_permission_if_default().await;

    let cancel = CancellationToken::new();
    if interactive {
        spawn_stdin_feed(bus.clone(), cancel.child_token())?;
    }
    let unlock = spawn_unlock_hook(&bus, dispatcher.clone(), cancel.child_token());

    let watcher = Arc::new(InterestWatcher::new(poller, tracker, dispatcher));
    let scheduler = Scheduler::new(watcher.clone(), config.overlap);

    let shutdown = spawn_shutdown_listener(tokio::signal::ctrl_c(), cancel.clone());

    scheduler
        .run(IntervalTicker::new(config.poll_interval()), cancel.clone())
        .await;

    cancel.cancel();
    let _ = unlock.await;
    let _ = shutdown.await;

    let stats = watcher.stats().snapshot();
    info!(
        watermark = watcher.watermark(),
        ticks = stats.ticks,
        escalations = stats.escalations,
        poll_failures = stats.poll_failures,
        "interest-watch stopped"
    );

    Ok(())
}
