//! The engine: shared state and session factory.

use crate::config::{EngineConfig, SessionConfig};
use crate::session::Session;
use sqlbean_cache::{Cacher, LruCacher};
use sqlbean_core::{Bean, Connection, Cx, Error, Outcome, Table, TableRegistry};
use sqlbean_pool::{Pool, PooledConnection};
use sqlbean_query::Dialect;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// State every session of one engine shares.
pub struct EngineShared {
    dialect: Arc<dyn Dialect>,
    registry: TableRegistry,
    default_cacher: RwLock<Option<Arc<dyn Cacher>>>,
    /// Per-table overrides; `None` disables caching for that table.
    table_cachers: RwLock<HashMap<String, Option<Arc<dyn Cacher>>>>,
    config: EngineConfig,
}

impl fmt::Debug for EngineShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineShared")
            .field("dialect", &self.dialect.name())
            .field("tables", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineShared {
    pub fn new(dialect: Arc<dyn Dialect>, config: EngineConfig) -> Self {
        let registry = TableRegistry::new(
            Arc::clone(&config.column_mapper),
            Arc::clone(&config.table_mapper),
        );
        let default_cacher = config
            .cache
            .clone()
            .map(|lru| Arc::new(LruCacher::memory(lru)) as Arc<dyn Cacher>);
        Self {
            dialect,
            registry,
            default_cacher: RwLock::new(default_cacher),
            table_cachers: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The resolved table for `B`.
    pub fn table_of<B: Bean>(&self) -> Arc<Table> {
        self.registry.table_of::<B>()
    }

    /// Replace the cacher used by tables without an override.
    pub fn set_default_cacher(&self, cacher: Option<Arc<dyn Cacher>>) {
        *self
            .default_cacher
            .write()
            .unwrap_or_else(PoisonError::into_inner) = cacher;
    }

    /// Give `table` its own cacher, or disable caching for it with `None`.
    pub fn set_table_cacher(&self, table: &str, cacher: Option<Arc<dyn Cacher>>) {
        self.table_cachers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), cacher);
    }

    /// Drop a per-table override so the default cacher applies again.
    pub fn reset_table_cacher(&self, table: &str) {
        self.table_cachers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table);
    }

    /// The cacher in effect for `table`.
    pub fn cacher_for(&self, table: &str) -> Option<Arc<dyn Cacher>> {
        if let Some(entry) = self
            .table_cachers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
        {
            return entry.clone();
        }
        self.default_cacher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owns the dialect, metadata, cachers and connection pool.
///
/// Cloning is cheap; clones share everything.
pub struct Engine<C: Connection> {
    pool: Pool<C>,
    shared: Arc<EngineShared>,
}

impl<C: Connection> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connection> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pool", &self.pool)
            .field("shared", &self.shared)
            .finish()
    }
}

impl<C: Connection> Engine<C> {
    pub fn new(dialect: Arc<dyn Dialect>, pool: Pool<C>, config: EngineConfig) -> Self {
        tracing::debug!(dialect = dialect.name(), "creating engine");
        Self {
            pool,
            shared: Arc::new(EngineShared::new(dialect, config)),
        }
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.shared.dialect()
    }

    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    pub fn table_of<B: Bean>(&self) -> Arc<Table> {
        self.shared.table_of::<B>()
    }

    pub fn set_default_cacher(&self, cacher: Option<Arc<dyn Cacher>>) {
        self.shared.set_default_cacher(cacher);
    }

    pub fn set_table_cacher(&self, table: &str, cacher: Option<Arc<dyn Cacher>>) {
        self.shared.set_table_cacher(table, cacher);
    }

    pub fn cacher_for(&self, table: &str) -> Option<Arc<dyn Cacher>> {
        self.shared.cacher_for(table)
    }

    /// Check a connection out of the pool and wrap it in a session.
    pub async fn new_session(&self, cx: &Cx) -> Outcome<Session<PooledConnection<C>>, Error> {
        let config = self.shared.config().session.clone();
        self.session_with(cx, config).await
    }

    /// A session that releases its connection after the first terminal
    /// operation outside a transaction.
    pub async fn auto_session(&self, cx: &Cx) -> Outcome<Session<PooledConnection<C>>, Error> {
        let config = self.shared.config().session.clone().auto_close(true);
        self.session_with(cx, config).await
    }

    async fn session_with(
        &self,
        cx: &Cx,
        config: SessionConfig,
    ) -> Outcome<Session<PooledConnection<C>>, Error> {
        let conn = try_outcome!(self.pool.acquire(cx).await);
        Outcome::Ok(Session::with_config(conn, Arc::clone(&self.shared), config))
    }

    /// Close the pool; sessions already out keep their connections.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbean_cache::LruConfig;
    use sqlbean_query::Sqlite;

    #[test]
    fn default_cacher_follows_config() {
        let plain = EngineShared::new(Arc::new(Sqlite), EngineConfig::default());
        assert!(plain.cacher_for("users").is_none());

        let cached = EngineShared::new(
            Arc::new(Sqlite),
            EngineConfig::default().cache(LruConfig::new()),
        );
        assert!(cached.cacher_for("users").is_some());
    }

    #[test]
    fn table_overrides_win() {
        let shared = EngineShared::new(
            Arc::new(Sqlite),
            EngineConfig::default().cache(LruConfig::new()),
        );
        shared.set_table_cacher("logs", None);
        assert!(shared.cacher_for("logs").is_none());
        assert!(shared.cacher_for("users").is_some());

        let own: Arc<dyn Cacher> = Arc::new(LruCacher::memory(LruConfig::new().max_beans(2)));
        shared.set_table_cacher("users", Some(Arc::clone(&own)));
        let got = shared.cacher_for("users").unwrap();
        assert!(Arc::ptr_eq(&got, &own));

        shared.reset_table_cacher("logs");
        assert!(shared.cacher_for("logs").is_some());
    }
}
