pub mod catalog;
pub mod notifier;
pub mod preferences;
pub mod roster;
pub mod version;

use std::{sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        preference_store::PreferenceStore,
        storage::{StorageError, StorageResult},
    },
    services::{catalog_service::CatalogSynchronizer, game_loop::LoopEvent},
    state::{
        catalog::RewardCatalog,
        preferences::PreferenceCache,
        roster::{CapabilityCheck, TokenCapabilities},
    },
};

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to the connected game server.
pub struct HostConnection {
    /// Identifies this socket among successive host links.
    pub id: Uuid,
    /// Name from the hello.
    pub server: String,
    /// Writer queue of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

#[derive(Debug, Clone)]
/// Catalog currently in effect and when it was installed.
pub struct CatalogSnapshot {
    /// Installed catalog.
    pub catalog: Arc<RewardCatalog>,
    /// When it was installed.
    pub loaded_at: SystemTime,
}

/// Central application state shared by the HTTP layer, the host bridge and the game loop.
pub struct AppState {
    config: Arc<AppConfig>,
    preferences: Arc<PreferenceCache>,
    preference_store: RwLock<Option<Arc<dyn PreferenceStore>>>,
    degraded: watch::Sender<bool>,
    catalog: watch::Sender<CatalogSnapshot>,
    synchronizer: CatalogSynchronizer,
    capabilities: Arc<dyn CapabilityCheck>,
    host: RwLock<Option<HostConnection>>,
    events: mpsc::UnboundedSender<LoopEvent>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`], with the receiving end of the game
    /// loop's event channel.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        synchronizer: CatalogSynchronizer,
        catalog: RewardCatalog,
    ) -> (SharedState, mpsc::UnboundedReceiver<LoopEvent>) {
        let (degraded_tx, _rx) = watch::channel(true);
        let (catalog_tx, _rx) = watch::channel(CatalogSnapshot {
            catalog: Arc::new(catalog),
            loaded_at: SystemTime::now(),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let capabilities = Arc::new(TokenCapabilities::new(
            config.commands.superuser_capability.clone(),
        ));

        let state = Arc::new(Self {
            config: Arc::new(config),
            preferences: Arc::new(PreferenceCache::new()),
            preference_store: RwLock::new(None),
            degraded: degraded_tx,
            catalog: catalog_tx,
            synchronizer,
            capabilities,
            host: RwLock::new(None),
            events: events_tx,
        });
        (state, events_rx)
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    /// Write-back preference cache.
    pub fn preferences(&self) -> &Arc<PreferenceCache> {
        &self.preferences
    }

    /// Catalog synchronizer used by the admin commands.
    pub fn synchronizer(&self) -> &CatalogSynchronizer {
        &self.synchronizer
    }

    /// Capability predicate for menu and admin checks.
    pub fn capabilities(&self) -> &dyn CapabilityCheck {
        self.capabilities.as_ref()
    }

    /// Obtain a handle to the current preference store, if one is installed.
    pub async fn preference_store(&self) -> Option<Arc<dyn PreferenceStore>> {
        let guard = self.preference_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current preference store, or [`StorageError::Degraded`] when none is installed.
    pub async fn require_preference_store(&self) -> StorageResult<Arc<dyn PreferenceStore>> {
        self.preference_store()
            .await
            .ok_or(StorageError::Degraded)
    }

    /// Install a new preference store implementation and leave degraded mode.
    pub async fn set_preference_store(&self, store: Arc<dyn PreferenceStore>) {
        {
            let mut guard = self.preference_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    #[cfg(test)]
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Catalog in effect right now.
    pub fn catalog(&self) -> Arc<RewardCatalog> {
        self.catalog.borrow().catalog.clone()
    }

    /// Catalog in effect together with its install time.
    pub fn catalog_snapshot(&self) -> CatalogSnapshot {
        self.catalog.borrow().clone()
    }

    /// Atomically swap in a new catalog; readers holding the old one keep it until they drop it.
    pub fn install_catalog(&self, catalog: RewardCatalog) -> Arc<RewardCatalog> {
        let catalog = Arc::new(catalog);
        self.catalog.send_replace(CatalogSnapshot {
            catalog: catalog.clone(),
            loaded_at: SystemTime::now(),
        });
        catalog
    }

    /// Make `connection` the active host link, returning the one it replaces.
    pub async fn attach_host(&self, connection: HostConnection) -> Option<HostConnection> {
        let mut guard = self.host.write().await;
        guard.replace(connection)
    }

    /// Drop the host link if it is still the one identified by `id`.
    pub async fn detach_host(&self, id: Uuid) -> bool {
        let mut guard = self.host.write().await;
        if guard.as_ref().is_some_and(|host| host.id == id) {
            guard.take();
            true
        } else {
            false
        }
    }

    /// Sender of the active host link.
    pub async fn host_sender(&self) -> Option<mpsc::UnboundedSender<Message>> {
        let guard = self.host.read().await;
        guard.as_ref().map(|host| host.tx.clone())
    }

    /// Name the active host announced in its hello.
    #[cfg(test)]
    pub async fn host_server(&self) -> Option<String> {
        let guard = self.host.read().await;
        guard.as_ref().map(|host| host.server.clone())
    }

    /// Queue an event for the game loop.
    pub fn send_event(&self, event: LoopEvent) {
        if self.events.send(event).is_err() {
            warn!("game loop is not running; event dropped");
        }
    }
}
