//! Coherent caches for sqlbean.
//!
//! The session consults a [`Cacher`] on reads and keeps it coherent on every
//! write: id lists for a table are torn down after any write to it, and the
//! beans an update or delete touched are evicted by key. The default
//! implementation is [`LruCacher`] over a pluggable [`CacheStore`].

pub mod key;
pub mod lru;
pub mod store;

pub use key::cache_key;
pub use lru::{LruCacher, LruConfig};
pub use store::{CacheStore, CacheValue, MemoryStore};

use sqlbean_core::{PrimaryKey, Value};
use std::fmt::Debug;

/// Cache contract the session is written against.
///
/// Beans are keyed by (table, primary key); id lists by (table, normalized
/// query key from [`cache_key`]). Implementations never fail: a broken
/// backing store behaves like an empty one.
pub trait Cacher: Send + Sync + Debug {
    fn get_ids(&self, table: &str, sql_key: &str) -> Option<Vec<PrimaryKey>>;

    fn get_bean(&self, table: &str, id: &PrimaryKey) -> Option<Vec<(String, Value)>>;

    fn put_ids(&self, table: &str, sql_key: &str, ids: Vec<PrimaryKey>);

    fn put_bean(&self, table: &str, id: &PrimaryKey, bean: Vec<(String, Value)>);

    fn del_ids(&self, table: &str, sql_key: &str);

    fn del_bean(&self, table: &str, id: &PrimaryKey);

    /// Drop every id list cached for `table`.
    fn clear_ids(&self, table: &str);

    /// Drop every bean cached for `table`.
    fn clear_beans(&self, table: &str);
}
