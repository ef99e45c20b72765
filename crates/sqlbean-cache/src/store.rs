//! Cache stores.
//!
//! A [`CacheStore`] is a dumb key/value map. The [`LruCacher`](crate::LruCacher)
//! decides what goes in and what comes out; the store only keeps it.

use serde::{Deserialize, Serialize};
use sqlbean_core::error::CacheError;
use sqlbean_core::{Error, PrimaryKey, Result, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// What a cache entry holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    /// Primary keys matched by one query
    Ids(Vec<PrimaryKey>),
    /// A bean's column values, keyed by column name
    Bean(Vec<(String, Value)>),
}

impl CacheValue {
    /// Encode for stores that keep bytes.
    #[allow(clippy::result_large_err)]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| cache_error("encode cache value", e))
    }

    #[allow(clippy::result_large_err)]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| cache_error("decode cache value", e))
    }
}

fn cache_error(what: &str, err: serde_json::Error) -> Error {
    Error::Cache(CacheError {
        message: format!("{what}: {err}"),
        source: Some(Box::new(err)),
    })
}

/// Key/value storage behind a cacher.
///
/// Errors never fail a database operation; the cacher logs them and treats
/// the entry as missing.
#[allow(clippy::result_large_err)]
pub trait CacheStore: Send + Sync + Debug {
    fn put(&self, key: &str, value: CacheValue) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    fn del(&self, key: &str) -> Result<()>;
}

/// In-process store over a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn put(&self, key: &str, value: CacheValue) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
