//! Engine and session configuration.

use sqlbean_cache::LruConfig;
use sqlbean_core::{NameMapper, SameMapper, SnakeMapper};
use sqlbean_query::QuotePolicy;
use std::sync::Arc;

/// Configuration for Session behavior.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Release the connection after the first terminal operation that runs
    /// outside a transaction.
    pub auto_close: bool,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_close(mut self, enabled: bool) -> Self {
        self.auto_close = enabled;
        self
    }
}

/// Configuration shared by every session an engine creates.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When identifiers go through the dialect's quoting.
    pub quote_policy: QuotePolicy,
    /// Rows fetched per page by `iterate`; 0 reads everything in one query.
    pub iterate_buffer_size: u64,
    /// Settings of the default in-memory LRU cacher; `None` disables
    /// caching unless a table gets its own cacher.
    pub cache: Option<LruConfig>,
    /// Maps bean field names to column names.
    pub column_mapper: Arc<dyn NameMapper>,
    /// Maps bean table names to database table names.
    pub table_mapper: Arc<dyn NameMapper>,
    /// Defaults for new sessions.
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quote_policy: QuotePolicy::Always,
            iterate_buffer_size: 0,
            cache: None,
            column_mapper: Arc::new(SnakeMapper),
            table_mapper: Arc::new(SameMapper),
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    pub fn iterate_buffer_size(mut self, rows: u64) -> Self {
        self.iterate_buffer_size = rows;
        self
    }

    /// Enable the default LRU cacher.
    pub fn cache(mut self, config: LruConfig) -> Self {
        self.cache = Some(config);
        self
    }

    pub fn column_mapper(mut self, mapper: Arc<dyn NameMapper>) -> Self {
        self.column_mapper = mapper;
        self
    }

    pub fn table_mapper(mut self, mapper: Arc<dyn NameMapper>) -> Self {
        self.table_mapper = mapper;
        self
    }

    pub fn session(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.quote_policy, QuotePolicy::Always);
        assert_eq!(config.iterate_buffer_size, 0);
        assert!(config.cache.is_none());
        assert!(!config.session.auto_close);
    }

    #[test]
    fn builders_chain() {
        let config = EngineConfig::new()
            .quote_policy(QuotePolicy::Reserved)
            .iterate_buffer_size(50)
            .cache(LruConfig::new().max_beans(10))
            .session(SessionConfig::new().auto_close(true));
        assert_eq!(config.quote_policy, QuotePolicy::Reserved);
        assert_eq!(config.iterate_buffer_size, 50);
        assert_eq!(config.cache.map(|c| c.max_beans), Some(10));
        assert!(config.session.auto_close);
    }
}
