//! Keeps a preference store installed in the shared state and drains the write-back backlog
//! whenever the store comes back after an outage.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{preference_store::PreferenceStore, storage::StorageError},
    state::{SharedState, preferences::FlushReport},
};

/// Delays and retry budget used by [`run_with`].
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTimings {
    /// First wait after a failed connect or reconnect; doubled on each further failure.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_delay: Duration,
    /// Pause between two health checks of a working store.
    pub health_poll: Duration,
    /// Reconnects tried on an installed store before connecting from scratch.
    pub reconnect_attempts: u32,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            health_poll: Duration::from_secs(5),
            reconnect_attempts: 3,
        }
    }
}

/// Doubling delay capped at `max`.
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(timings: &SupervisorTimings) -> Self {
        Self {
            initial: timings.initial_delay,
            max: timings.max_delay,
            current: timings.initial_delay,
        }
    }

    async fn wait(&mut self) {
        sleep(self.current).await;
        self.current = (self.current * 2).min(self.max);
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Supervise the store with [`SupervisorTimings::default`].
pub async fn run<F, Fut>(state: SharedState, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PreferenceStore>, StorageError>> + Send,
{
    run_with(state, connect, SupervisorTimings::default()).await
}

/// Connect to the preference store and keep the shared state in degraded mode while it is
/// unreachable.
///
/// Each time the store becomes usable again, preferences changed during the outage are flushed
/// right away instead of waiting for the game loop's periodic flush.
pub async fn run_with<F, Fut>(state: SharedState, mut connect: F, timings: SupervisorTimings)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PreferenceStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new(&timings);

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "preference store connection failed");
                backoff.wait().await;
                continue;
            }
        };

        state.set_preference_store(store.clone()).await;
        info!("preference store installed");
        backoff.reset();
        flush_backlog(&state, store.as_ref()).await;

        watch_store(&state, store.as_ref(), &timings).await;
        warn!("preference store lost; connecting again");
        backoff.wait().await;
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn watch_store(state: &SharedState, store: &dyn PreferenceStore, timings: &SupervisorTimings) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("preference store healthy again");
                state.update_degraded(false).await;
                flush_backlog(state, store).await;
            }
            sleep(timings.health_poll).await;
            continue;
        }

        if !reconnect(state, store, timings).await {
            return;
        }
        state.update_degraded(false).await;
        flush_backlog(state, store).await;
        sleep(timings.health_poll).await;
    }
}

/// Try to revive an installed store, entering degraded mode after the first failure.
async fn reconnect(state: &SharedState, store: &dyn PreferenceStore, timings: &SupervisorTimings) -> bool {
    let mut backoff = Backoff::new(timings);

    for attempt in 0..timings.reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "preference store reconnected");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(error = %err, "preference store unreachable; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "preference store reconnect failed");
                }
                backoff.wait().await;
            }
        }
    }

    warn!(
        attempts = timings.reconnect_attempts,
        "preference store reconnects exhausted"
    );
    false
}

/// Write every dirty cached preference to `store`.
///
/// Entries that fail stay dirty for the next periodic flush.
async fn flush_backlog(state: &SharedState, store: &dyn PreferenceStore) -> FlushReport {
    let preferences = state.preferences();
    let pending = preferences.dirty_count();
    if pending == 0 {
        debug!("no preferences waiting for the store");
        return FlushReport::default();
    }

    let report = preferences.flush_all(store).await;
    if report.failed > 0 {
        warn!(
            pending,
            written = report.written,
            failed = report.failed,
            "backlog partially saved"
        );
    } else {
        info!(written = report.written, "backlog saved after store recovery");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::preference_store::memory::MemoryStore,
        services::catalog_service::CatalogSynchronizer,
        state::{AppState, catalog::RewardCatalog},
    };

    fn state() -> SharedState {
        let mut config = AppConfig::default();
        config.settings.catalog_url = String::new();
        let synchronizer = CatalogSynchronizer::from_config(&config);
        AppState::new(config, synchronizer, RewardCatalog::builtin_default()).0
    }

    fn fast() -> SupervisorTimings {
        SupervisorTimings {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            health_poll: Duration::from_millis(10),
            reconnect_attempts: 3,
        }
    }

    fn supervise(state: &SharedState, store: MemoryStore) -> tokio::task::JoinHandle<()> {
        tokio::spawn(run_with(
            state.clone(),
            move || {
                let store: Arc<dyn PreferenceStore> = Arc::new(store.clone());
                async move { Ok::<_, StorageError>(store) }
            },
            fast(),
        ))
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition reached in time");
    }

    #[tokio::test]
    async fn installs_the_store_and_leaves_degraded_mode() {
        let state = state();
        assert!(state.is_degraded().await);

        let mut degraded = state.degraded_watcher();
        let supervisor = supervise(&state, MemoryStore::default());

        tokio::time::timeout(Duration::from_secs(5), degraded.wait_for(|value| !value))
            .await
            .expect("left degraded mode in time")
            .unwrap();
        assert!(state.preference_store().await.is_some());
        supervisor.abort();
    }

    #[tokio::test]
    async fn choices_made_before_the_store_connects_are_saved_on_install() {
        let state = state();
        state.preferences().set(7, "Ace".into(), "Mvp.Ace".into());
        assert_eq!(state.preferences().dirty_count(), 1);

        let store = MemoryStore::default();
        let supervisor = supervise(&state, store.clone());

        eventually(|| store.row(7).is_some()).await;
        let row = store.row(7).unwrap();
        assert_eq!(row.reward_name.as_deref(), Some("Ace"));
        eventually(|| state.preferences().dirty_count() == 0).await;
        supervisor.abort();
    }

    #[tokio::test]
    async fn backlog_from_an_outage_is_flushed_when_the_store_recovers() {
        let state = state();
        let store = MemoryStore::default();
        let supervisor = supervise(&state, store.clone());
        let mut degraded = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(5), degraded.wait_for(|value| !value))
            .await
            .expect("store installed")
            .unwrap();

        store.set_failing(true);
        tokio::time::timeout(Duration::from_secs(5), degraded.wait_for(|value| *value))
            .await
            .expect("entered degraded mode")
            .unwrap();
        state.preferences().set(9, "Clutch".into(), "Mvp.Clutch".into());

        store.set_failing(false);
        eventually(|| store.row(9).is_some()).await;
        assert!(!state.is_degraded().await);
        eventually(|| state.preferences().dirty_count() == 0).await;
        supervisor.abort();
    }
}
