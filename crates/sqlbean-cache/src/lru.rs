//! LRU cacher over a [`CacheStore`].
//!
//! Two keyspaces per table live in the store:
//!
//! - `bean:<table>:<id>`: one bean's column values, bounded by
//!   [`LruConfig::max_beans`] with least-recently-used eviction;
//! - `ids:<table>:<query key>`: the primary keys one query matched,
//!   unbounded and torn down per table on every write.
//!
//! The cacher tracks which keys it wrote so it can evict and clear without
//! the store supporting scans. Every operation runs under one mutex.

use crate::Cacher;
use crate::store::{CacheStore, CacheValue, MemoryStore};
use sqlbean_core::{PrimaryKey, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Sizing and expiry for an [`LruCacher`].
#[derive(Debug, Clone)]
pub struct LruConfig {
    /// Most beans kept across all tables
    pub max_beans: usize,
    /// Entries older than this are treated as missing
    pub expiry: Option<Duration>,
}

impl Default for LruConfig {
    fn default() -> Self {
        Self {
            max_beans: 1000,
            expiry: None,
        }
    }
}

impl LruConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_beans(mut self, max: usize) -> Self {
        self.max_beans = max;
        self
    }

    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    tick: u64,
    stored_at: Instant,
}

/// (table, key) pairs the cacher has written.
type Tracked = HashMap<(String, String), Entry>;

#[derive(Debug, Default)]
struct LruState {
    tick: u64,
    beans: Tracked,
    /// Bean keys by last use; the first entry is the eviction victim.
    recency: BTreeMap<u64, (String, String)>,
    ids: Tracked,
}

impl LruState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn insert_bean(&mut self, tracked: (String, String)) {
        let tick = self.next_tick();
        let entry = Entry {
            tick,
            stored_at: Instant::now(),
        };
        if let Some(old) = self.beans.insert(tracked.clone(), entry) {
            self.recency.remove(&old.tick);
        }
        self.recency.insert(tick, tracked);
    }

    fn touch_bean(&mut self, tracked: &(String, String)) {
        let tick = self.next_tick();
        if let Some(entry) = self.beans.get_mut(tracked) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, tracked.clone());
        }
    }

    fn remove_bean(&mut self, tracked: &(String, String)) {
        if let Some(old) = self.beans.remove(tracked) {
            self.recency.remove(&old.tick);
        }
    }
}

/// The default [`Cacher`].
pub struct LruCacher {
    store: Arc<dyn CacheStore>,
    config: LruConfig,
    state: Mutex<LruState>,
}

impl fmt::Debug for LruCacher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCacher")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LruCacher {
    pub fn new(store: Arc<dyn CacheStore>, config: LruConfig) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(LruState::default()),
        }
    }

    /// An LRU cacher over a fresh [`MemoryStore`].
    pub fn memory(config: LruConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &LruConfig {
        &self.config
    }

    /// Number of beans currently cached.
    pub fn bean_count(&self) -> usize {
        self.lock().beans.len()
    }

    /// Number of id lists currently cached.
    pub fn id_list_count(&self) -> usize {
        self.lock().ids.len()
    }

    fn lock(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, entry: &Entry) -> bool {
        self.config
            .expiry
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    fn store_get(&self, key: &str) -> Option<CacheValue> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache store get failed; treating as miss");
                None
            }
        }
    }

    fn store_put(&self, key: &str, value: CacheValue) -> bool {
        match self.store.put(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache store put failed; entry dropped");
                false
            }
        }
    }

    fn store_del(&self, key: &str) {
        if let Err(e) = self.store.del(key) {
            tracing::warn!(key, error = %e, "cache store del failed");
        }
    }

    fn evict_over_capacity(&self, state: &mut LruState) {
        while state.beans.len() > self.config.max_beans {
            let Some((_, victim)) = state.recency.pop_first() else {
                break;
            };
            state.beans.remove(&victim);
            self.store_del(&bean_key(&victim.0, &victim.1));
            tracing::debug!(table = %victim.0, id = %victim.1, "evicted least recently used bean");
        }
    }
}

fn bean_key(table: &str, id: &str) -> String {
    format!("bean:{table}:{id}")
}

fn ids_key(table: &str, sql_key: &str) -> String {
    format!("ids:{table}:{sql_key}")
}

impl Cacher for LruCacher {
    fn get_ids(&self, table: &str, sql_key: &str) -> Option<Vec<PrimaryKey>> {
        let mut state = self.lock();
        let tracked = (table.to_string(), sql_key.to_string());
        let key = ids_key(table, sql_key);
        let entry = *state.ids.get(&tracked)?;
        if self.expired(&entry) {
            state.ids.remove(&tracked);
            self.store_del(&key);
            return None;
        }
        match self.store_get(&key) {
            Some(CacheValue::Ids(ids)) => {
                tracing::trace!(table, "id list cache hit");
                Some(ids)
            }
            _ => {
                state.ids.remove(&tracked);
                None
            }
        }
    }

    fn get_bean(&self, table: &str, id: &PrimaryKey) -> Option<Vec<(String, Value)>> {
        let mut state = self.lock();
        let tracked = (table.to_string(), id.key_string());
        let key = bean_key(table, &tracked.1);
        let Some(entry) = state.beans.get(&tracked).copied() else {
            tracing::trace!(table, id = %id, "bean cache miss");
            return None;
        };
        if self.expired(&entry) {
            state.remove_bean(&tracked);
            self.store_del(&key);
            return None;
        }
        match self.store_get(&key) {
            Some(CacheValue::Bean(values)) => {
                state.touch_bean(&tracked);
                tracing::trace!(table, id = %id, "bean cache hit");
                Some(values)
            }
            _ => {
                state.remove_bean(&tracked);
                None
            }
        }
    }

    fn put_ids(&self, table: &str, sql_key: &str, ids: Vec<PrimaryKey>) {
        let mut state = self.lock();
        if !self.store_put(&ids_key(table, sql_key), CacheValue::Ids(ids)) {
            return;
        }
        let tick = state.next_tick();
        state.ids.insert(
            (table.to_string(), sql_key.to_string()),
            Entry {
                tick,
                stored_at: Instant::now(),
            },
        );
    }

    fn put_bean(&self, table: &str, id: &PrimaryKey, bean: Vec<(String, Value)>) {
        let mut state = self.lock();
        let id = id.key_string();
        if !self.store_put(&bean_key(table, &id), CacheValue::Bean(bean)) {
            return;
        }
        state.insert_bean((table.to_string(), id));
        self.evict_over_capacity(&mut state);
    }

    fn del_ids(&self, table: &str, sql_key: &str) {
        let mut state = self.lock();
        state.ids.remove(&(table.to_string(), sql_key.to_string()));
        self.store_del(&ids_key(table, sql_key));
    }

    fn del_bean(&self, table: &str, id: &PrimaryKey) {
        let mut state = self.lock();
        let id = id.key_string();
        self.store_del(&bean_key(table, &id));
        state.remove_bean(&(table.to_string(), id));
    }

    fn clear_ids(&self, table: &str) {
        let mut state = self.lock();
        let doomed: Vec<_> = state
            .ids
            .keys()
            .filter(|(t, _)| t == table)
            .cloned()
            .collect();
        for tracked in doomed {
            self.store_del(&ids_key(&tracked.0, &tracked.1));
            state.ids.remove(&tracked);
        }
    }

    fn clear_beans(&self, table: &str) {
        let mut state = self.lock();
        let doomed: Vec<_> = state
            .beans
            .keys()
            .filter(|(t, _)| t == table)
            .cloned()
            .collect();
        for tracked in doomed {
            self.store_del(&bean_key(&tracked.0, &tracked.1));
            state.remove_bean(&tracked);
        }
    }
}
