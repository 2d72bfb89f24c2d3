/// CouchDB-backed preference store.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// MongoDB-backed preference store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::PreferenceEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the durable key/value store holding player preferences.
///
/// Only a point read and a last-write-wins upsert are required; the remaining methods feed the
/// storage supervisor.
pub trait PreferenceStore: Send + Sync {
    /// Read the player's record; `None` when the player was never stored.
    fn find_preference(
        &self,
        player_id: u64,
    ) -> BoxFuture<'static, StorageResult<Option<PreferenceEntity>>>;
    /// Insert or overwrite the player's record.
    fn save_preference(&self, preference: PreferenceEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store used by unit tests across the crate.

    use std::{
        collections::HashMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    use futures::future::BoxFuture;

    use super::PreferenceStore;
    use crate::dao::{
        models::PreferenceEntity,
        storage::{StorageError, StorageResult},
    };

    #[derive(Debug, thiserror::Error)]
    #[error("simulated outage")]
    struct Outage;

    /// Store backed by a `HashMap`, with switchable failure injection and call counters.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        rows: Arc<Mutex<HashMap<u64, PreferenceEntity>>>,
        failing: Arc<AtomicBool>,
        pub reads: Arc<AtomicUsize>,
        pub writes: Arc<AtomicUsize>,
    }

    impl MemoryStore {
        pub fn with_row(self, row: PreferenceEntity) -> Self {
            self.rows.lock().unwrap().insert(row.player_id, row);
            self
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn row(&self, player_id: u64) -> Option<PreferenceEntity> {
            self.rows.lock().unwrap().get(&player_id).cloned()
        }

        fn check(&self) -> StorageResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StorageError::unavailable("memory store down".into(), Outage))
            } else {
                Ok(())
            }
        }
    }

    impl PreferenceStore for MemoryStore {
        fn find_preference(
            &self,
            player_id: u64,
        ) -> BoxFuture<'static, StorageResult<Option<PreferenceEntity>>> {
            let store = self.clone();
            Box::pin(async move {
                store.reads.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                store.check()?;
                Ok(store.row(player_id))
            })
        }

        fn save_preference(
            &self,
            preference: PreferenceEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            let store = self.clone();
            Box::pin(async move {
                store.writes.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                store.check()?;
                store
                    .rows
                    .lock()
                    .unwrap()
                    .insert(preference.player_id, preference);
                Ok(())
            })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            let store = self.clone();
            Box::pin(async move { store.check() })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            let store = self.clone();
            Box::pin(async move { store.check() })
        }
    }
}
