//! Write-back cache of player preferences in front of a [`PreferenceStore`].
//!
//! Mutations only touch memory and bump a per-entry version; flushes copy the current value to the
//! store and afterwards record the version they wrote. An entry is dirty while its version is ahead
//! of the persisted one, so a mutation racing a flush is never lost.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::dao::{
    models::PreferenceEntity,
    preference_store::PreferenceStore,
    storage::StorageResult,
};

/// Selected reward of a player, identified by the (display name, sound id) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPreference {
    /// 64-bit platform id.
    pub player_id: u64,
    /// Display name of the selected reward.
    pub reward_name: Option<String>,
    /// Sound of the selected reward.
    pub reward_sound: Option<String>,
}

impl PlayerPreference {
    /// Preference of a player who never picked anything.
    pub fn empty(player_id: u64) -> Self {
        Self {
            player_id,
            reward_name: None,
            reward_sound: None,
        }
    }

    /// Both fields, only when both are set and non-empty.
    pub fn selection(&self) -> Option<(&str, &str)> {
        match (self.reward_name.as_deref(), self.reward_sound.as_deref()) {
            (Some(name), Some(sound)) if !name.is_empty() && !sound.is_empty() => {
                Some((name, sound))
            }
            _ => None,
        }
    }
}

impl From<PreferenceEntity> for PlayerPreference {
    fn from(value: PreferenceEntity) -> Self {
        Self {
            player_id: value.player_id,
            reward_name: value.reward_name,
            reward_sound: value.reward_sound,
        }
    }
}

impl From<PlayerPreference> for PreferenceEntity {
    fn from(value: PlayerPreference) -> Self {
        Self {
            player_id: value.player_id,
            reward_name: value.reward_name,
            reward_sound: value.reward_sound,
        }
    }
}

/// Outcome of [`PreferenceCache::flush_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries durably written.
    pub written: usize,
    /// Entries whose write failed; they stay dirty.
    pub failed: usize,
}

struct CachedEntry {
    preference: PlayerPreference,
    version: u64,
    persisted_version: u64,
    /// Distinguishes an entry from one re-created after eviction under the same id.
    incarnation: u64,
    /// Serializes flushes of this entry so writes reach the store in order.
    write_lock: Arc<Mutex<()>>,
}

impl CachedEntry {
    fn clean(preference: PlayerPreference, incarnation: u64) -> Self {
        Self {
            preference,
            version: 0,
            persisted_version: 0,
            incarnation,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn is_dirty(&self) -> bool {
        self.version != self.persisted_version
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

/// Membership in the single-flight gate of one player id.
///
/// The gate is removed from the map when its last holder leaves, including a caller whose future
/// was dropped mid-read.
struct LoadingSlot<'a> {
    loading: &'a DashMap<u64, Arc<Mutex<()>>>,
    player_id: u64,
    gate: Arc<Mutex<()>>,
}

impl<'a> LoadingSlot<'a> {
    fn enter(loading: &'a DashMap<u64, Arc<Mutex<()>>>, player_id: u64) -> Self {
        let gate = loading.entry(player_id).or_default().clone();
        Self {
            loading,
            player_id,
            gate,
        }
    }

    fn gate(&self) -> &Mutex<()> {
        &self.gate
    }
}

impl Drop for LoadingSlot<'_> {
    fn drop(&mut self) {
        // Held by the map and by this slot only.
        self.loading.remove_if(&self.player_id, |_, current| {
            Arc::ptr_eq(current, &self.gate) && Arc::strong_count(current) == 2
        });
    }
}

/// In-memory map from player id to cached preference.
#[derive(Default)]
pub struct PreferenceCache {
    entries: DashMap<u64, CachedEntry>,
    loading: DashMap<u64, Arc<Mutex<()>>>,
    incarnations: AtomicU64,
}

impl PreferenceCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_incarnation(&self) -> u64 {
        self.incarnations.fetch_add(1, Ordering::Relaxed)
    }

    fn snapshot(&self, player_id: u64) -> Option<PlayerPreference> {
        self.entries
            .get(&player_id)
            .map(|entry| entry.preference.clone())
    }

    /// Return the cached preference, reading it from the store on a miss.
    ///
    /// Concurrent misses for one id share a single store read. A player without a stored row gets
    /// an empty clean entry. On a store error nothing is cached, so a later call retries.
    pub async fn get_or_load(
        &self,
        store: &dyn PreferenceStore,
        player_id: u64,
    ) -> StorageResult<PlayerPreference> {
        if let Some(preference) = self.snapshot(player_id) {
            return Ok(preference);
        }

        let slot = LoadingSlot::enter(&self.loading, player_id);
        let _guard = slot.gate().lock().await;

        let outcome = match self.snapshot(player_id) {
            Some(preference) => Ok(preference),
            None => match store.find_preference(player_id).await {
                Ok(row) => {
                    let loaded = row
                        .map(PlayerPreference::from)
                        .unwrap_or_else(|| PlayerPreference::empty(player_id));
                    // A `set` that landed while the read was in flight wins over the stored row.
                    let entry = self
                        .entries
                        .entry(player_id)
                        .or_insert_with(|| CachedEntry::clean(loaded, self.next_incarnation()));
                    Ok(entry.preference.clone())
                }
                Err(err) => Err(err),
            },
        };

        outcome
    }

    /// Pure in-memory read of `(reward_name, reward_sound)`.
    pub fn get(&self, player_id: u64) -> (Option<String>, Option<String>) {
        self.entries
            .get(&player_id)
            .map(|entry| {
                (
                    entry.preference.reward_name.clone(),
                    entry.preference.reward_sound.clone(),
                )
            })
            .unwrap_or_default()
    }

    /// Select a reward for the player, creating the entry if needed.
    pub fn set(&self, player_id: u64, reward_name: String, reward_sound: String) {
        let mut entry = self.entries.entry(player_id).or_insert_with(|| {
            CachedEntry::clean(PlayerPreference::empty(player_id), self.next_incarnation())
        });
        entry.preference.reward_name = Some(reward_name);
        entry.preference.reward_sound = Some(reward_sound);
        entry.touch();
    }

    /// Clear the player's selection. Unknown players are ignored.
    pub fn remove(&self, player_id: u64) {
        if let Some(mut entry) = self.entries.get_mut(&player_id) {
            entry.preference.reward_name = None;
            entry.preference.reward_sound = None;
            entry.touch();
        }
    }

    /// Persist the entry if it is dirty. Returns whether a write happened.
    ///
    /// The entry is marked clean only after the write succeeds and only up to the version that was
    /// written. On failure it stays dirty for a later retry.
    pub async fn flush_one(
        &self,
        store: &dyn PreferenceStore,
        player_id: u64,
    ) -> StorageResult<bool> {
        let Some((write_lock, incarnation)) = self
            .entries
            .get(&player_id)
            .map(|entry| (entry.write_lock.clone(), entry.incarnation))
        else {
            return Ok(false);
        };

        let _write = write_lock.lock().await;

        let snapshot = match self.entries.get(&player_id) {
            Some(entry) if entry.incarnation == incarnation && entry.is_dirty() => {
                Some((entry.preference.clone(), entry.version))
            }
            _ => None,
        };
        let Some((preference, version)) = snapshot else {
            return Ok(false);
        };

        store.save_preference(preference.into()).await?;

        if let Some(mut entry) = self.entries.get_mut(&player_id) {
            if entry.incarnation == incarnation {
                entry.persisted_version = entry.persisted_version.max(version);
            }
        }
        debug!(player_id, version, "preference flushed");
        Ok(true)
    }

    /// Flush every dirty entry concurrently.
    pub async fn flush_all(&self, store: &dyn PreferenceStore) -> FlushReport {
        let dirty: Vec<u64> = self
            .entries
            .iter()
            .filter(|entry| entry.is_dirty())
            .map(|entry| *entry.key())
            .collect();

        let outcomes = join_all(
            dirty
                .into_iter()
                .map(|player_id| async move { (player_id, self.flush_one(store, player_id).await) }),
        )
        .await;

        let mut report = FlushReport::default();
        for (player_id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.written += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(player_id, error = %err, "failed to flush preference");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Drop the entry regardless of its dirty state.
    pub fn evict_player(&self, player_id: u64) {
        self.entries.remove(&player_id);
    }

    /// Drop the entry only when it has nothing left to write. Returns whether it was removed.
    pub fn evict_if_clean(&self, player_id: u64) -> bool {
        self.entries
            .remove_if(&player_id, |_, entry| !entry.is_dirty())
            .is_some()
    }

    /// Drop every clean entry whose id matches `predicate`. Returns how many were removed.
    pub fn evict_clean_where(&self, predicate: impl Fn(u64) -> bool) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|player_id, entry| entry.is_dirty() || !predicate(*player_id));
        before.saturating_sub(self.entries.len())
    }

    /// Whether the player's entry holds changes not yet in the store.
    pub fn is_dirty(&self, player_id: u64) -> bool {
        self.entries
            .get(&player_id)
            .is_some_and(|entry| entry.is_dirty())
    }

    /// Entries waiting for a flush.
    pub fn dirty_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_dirty()).count()
    }

    /// Whether the player has an entry, clean or dirty.
    pub fn contains(&self, player_id: u64) -> bool {
        self.entries.contains_key(&player_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::dao::preference_store::memory::MemoryStore;

    const PLAYER: u64 = 76561198000000001;

    fn row(name: &str, sound: &str) -> PreferenceEntity {
        PreferenceEntity {
            player_id: PLAYER,
            reward_name: Some(name.into()),
            reward_sound: Some(sound.into()),
        }
    }

    struct StalledStore;

    impl PreferenceStore for StalledStore {
        fn find_preference(
            &self,
            _player_id: u64,
        ) -> futures::future::BoxFuture<'static, StorageResult<Option<PreferenceEntity>>> {
            Box::pin(futures::future::pending())
        }

        fn save_preference(
            &self,
            _preference: PreferenceEntity,
        ) -> futures::future::BoxFuture<'static, StorageResult<()>> {
            Box::pin(futures::future::pending())
        }

        fn health_check(&self) -> futures::future::BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn try_reconnect(&self) -> futures::future::BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn abandoned_load_releases_its_gate() {
        let cache = PreferenceCache::new();
        let stalled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            cache.get_or_load(&StalledStore, PLAYER),
        )
        .await;
        assert!(stalled.is_err());
        assert!(cache.loading.is_empty());

        let store = MemoryStore::default().with_row(row("Ace", "MVP.002_ace"));
        let loaded = cache.get_or_load(&store, PLAYER).await.unwrap();
        assert_eq!(loaded.reward_name.as_deref(), Some("Ace"));
        assert!(cache.loading.is_empty());
    }

    #[tokio::test]
    async fn abandoned_waiters_release_the_shared_gate() {
        let cache = PreferenceCache::new();
        let first = cache.get_or_load(&StalledStore, PLAYER);
        let second = cache.get_or_load(&StalledStore, PLAYER);
        let both = async { futures::join!(first, second) };
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), both)
                .await
                .is_err()
        );
        assert!(cache.loading.is_empty());
    }

    #[test]
    fn set_then_get_returns_the_selection_and_marks_dirty() {
        let cache = PreferenceCache::new();
        cache.set(PLAYER, "Ace".into(), "MVP.002_ace".into());
        assert_eq!(
            cache.get(PLAYER),
            (Some("Ace".into()), Some("MVP.002_ace".into()))
        );
        assert!(cache.is_dirty(PLAYER));
    }

    #[test]
    fn remove_nulls_both_fields_and_marks_dirty() {
        let cache = PreferenceCache::new();
        cache.remove(PLAYER);
        assert!(!cache.contains(PLAYER));

        cache.set(PLAYER, "Ace".into(), "MVP.002_ace".into());
        cache.remove(PLAYER);
        assert_eq!(cache.get(PLAYER), (None, None));
        assert!(cache.is_dirty(PLAYER));
    }

    #[tokio::test]
    async fn missing_row_materializes_a_clean_empty_entry() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        let loaded = cache.get_or_load(&store, PLAYER).await.unwrap();
        assert_eq!(loaded, PlayerPreference::empty(PLAYER));
        assert!(cache.contains(PLAYER));
        assert!(!cache.is_dirty(PLAYER));
    }

    #[tokio::test]
    async fn cached_entries_are_not_read_twice() {
        let store = MemoryStore::default().with_row(row("Ace", "MVP.002_ace"));
        let cache = PreferenceCache::new();
        cache.get_or_load(&store, PLAYER).await.unwrap();
        let again = cache.get_or_load(&store, PLAYER).await.unwrap();
        assert_eq!(again.reward_name.as_deref(), Some("Ace"));
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_loads_collapse_into_one_read() {
        let store = MemoryStore::default().with_row(row("Ace", "MVP.002_ace"));
        let cache = PreferenceCache::new();
        let (a, b) = tokio::join!(
            cache.get_or_load(&store, PLAYER),
            cache.get_or_load(&store, PLAYER)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn load_failure_caches_nothing_and_retries_later() {
        let store = MemoryStore::default().with_row(row("Ace", "MVP.002_ace"));
        store.set_failing(true);
        let cache = PreferenceCache::new();
        assert!(cache.get_or_load(&store, PLAYER).await.is_err());
        assert!(!cache.contains(PLAYER));

        store.set_failing(false);
        let loaded = cache.get_or_load(&store, PLAYER).await.unwrap();
        assert_eq!(loaded.reward_sound.as_deref(), Some("MVP.002_ace"));
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn set_during_load_wins_over_the_stored_row() {
        let store = MemoryStore::default().with_row(row("Old", "S.old"));
        let cache = PreferenceCache::new();
        let (loaded, ()) = futures::join!(cache.get_or_load(&store, PLAYER), async {
            cache.set(PLAYER, "New".into(), "S.new".into());
        });
        assert_eq!(loaded.unwrap().reward_name.as_deref(), Some("New"));
        assert!(cache.is_dirty(PLAYER));
    }

    #[tokio::test]
    async fn failed_flush_keeps_the_entry_dirty() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.set(PLAYER, "Ace".into(), "MVP.002_ace".into());

        store.set_failing(true);
        assert!(cache.flush_one(&store, PLAYER).await.is_err());
        assert!(cache.is_dirty(PLAYER));
        assert!(!cache.evict_if_clean(PLAYER));

        store.set_failing(false);
        assert!(cache.flush_one(&store, PLAYER).await.unwrap());
        assert!(!cache.is_dirty(PLAYER));
        assert_eq!(store.row(PLAYER), Some(row("Ace", "MVP.002_ace")));
    }

    #[tokio::test]
    async fn clean_entries_are_not_written() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.get_or_load(&store, PLAYER).await.unwrap();
        assert!(!cache.flush_one(&store, PLAYER).await.unwrap());
        assert!(!cache.flush_one(&store, 42).await.unwrap());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mutation_during_flush_stays_dirty() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.set(PLAYER, "Ace".into(), "MVP.002_ace".into());

        let (flushed, ()) = futures::join!(cache.flush_one(&store, PLAYER), async {
            cache.set(PLAYER, "Flawless".into(), "MVP.001_bamia".into());
        });
        assert!(flushed.unwrap());
        assert_eq!(store.row(PLAYER), Some(row("Ace", "MVP.002_ace")));
        assert!(cache.is_dirty(PLAYER));

        assert!(cache.flush_one(&store, PLAYER).await.unwrap());
        assert_eq!(store.row(PLAYER), Some(row("Flawless", "MVP.001_bamia")));
        assert!(!cache.is_dirty(PLAYER));
    }

    #[tokio::test]
    async fn flush_does_not_clean_an_entry_recreated_after_eviction() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.set(PLAYER, "Ace".into(), "MVP.002_ace".into());

        let (flushed, ()) = futures::join!(cache.flush_one(&store, PLAYER), async {
            cache.evict_player(PLAYER);
            cache.set(PLAYER, "Flawless".into(), "MVP.001_bamia".into());
        });
        assert!(flushed.unwrap());
        assert!(cache.is_dirty(PLAYER));
    }

    #[tokio::test]
    async fn flush_all_reports_written_and_failed_entries() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.set(1, "Ace".into(), "MVP.002_ace".into());
        cache.set(2, "Flawless".into(), "MVP.001_bamia".into());
        assert_eq!(cache.dirty_count(), 2);

        store.set_failing(true);
        let report = cache.flush_all(&store).await;
        assert_eq!(report, FlushReport { written: 0, failed: 2 });
        assert_eq!(cache.dirty_count(), 2);

        store.set_failing(false);
        let report = cache.flush_all(&store).await;
        assert_eq!(report, FlushReport { written: 2, failed: 0 });
        assert_eq!(cache.dirty_count(), 0);
    }

    #[tokio::test]
    async fn clean_eviction_spares_dirty_entries() {
        let store = MemoryStore::default();
        let cache = PreferenceCache::new();
        cache.set(1, "Ace".into(), "MVP.002_ace".into());
        cache.get_or_load(&store, 2).await.unwrap();
        cache.get_or_load(&store, 3).await.unwrap();

        assert_eq!(cache.evict_clean_where(|id| id != 3), 1);
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }
}
