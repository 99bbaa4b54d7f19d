use {
    super::SessionStore,
    std::time::Duration,
    tokio::time::MissedTickBehavior,
    tokio_util::{sync::CancellationToken, task::AbortOnDropHandle},
};

/// Spawns the background task that evicts idle sessions every `interval`.
///
/// The task runs on the current Tokio runtime until `shutdown` is cancelled.
/// Dropping the returned handle aborts it as well, so the reaper never
/// outlives whatever owns the handle.
///
/// A sweep that overruns its interval delays the next one instead of
/// triggering a burst of catch-up sweeps.
pub fn spawn_reaper(
    store: SessionStore,
    interval: Duration,
    shutdown: CancellationToken,
) -> AbortOnDropHandle<()> {
    AbortOnDropHandle::new(tokio::spawn(reaper_task(store, interval, shutdown)))
}

async fn reaper_task(store: SessionStore, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    tracing::debug!(?interval, "Session reaper started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = store.reap_expired();
                tracing::debug!(evicted, remaining = store.len(), "Session reaper sweep");
            }
        }
    }
    tracing::debug!("Session reaper stopped");
}
