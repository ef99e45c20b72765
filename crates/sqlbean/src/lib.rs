//! sqlbean - a bean-oriented ORM with chainable statements and a coherent
//! cache.
//!
//! sqlbean maps plain Rust structs ("beans") to tables and gives you:
//!
//! - A chainable statement builder (`where_`, `in_`, `id`, `cols`, `omit`,
//!   `asc`, `limit`, ...) rendered per SQL dialect
//! - Sessions with insert, update, delete, get, find, count, exist and
//!   paged iteration, plus raw `exec`/`query`
//! - Auto-stamped created/updated columns, soft delete and optimistic
//!   locking through a version column
//! - A per-table LRU cache kept coherent on every write
//! - Connection pooling on the asupersync runtime
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbean::prelude::*;
//! use sqlbean_sqlite::SqliteConnection;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Hero {
//!     id: i64,
//!     name: String,
//!     age: i32,
//! }
//!
//! static HERO_COLUMNS: &[Column] = &[
//!     Column::new("id", SqlType::BigInt).primary_key(true).auto_increment(true),
//!     Column::new("name", SqlType::VarChar).length(64),
//!     Column::new("age", SqlType::Integer),
//! ];
//!
//! impl Bean for Hero {
//!     const TABLE_NAME: &'static str = "heroes";
//!     fn columns() -> &'static [Column] { HERO_COLUMNS }
//!     // field_values / set_field ...
//! }
//!
//! async fn example(cx: &Cx) -> Outcome<(), Error> {
//!     let pool = Pool::new(PoolConfig::new(1), SqliteConnection::open_memory);
//!     let engine = Engine::new(Arc::new(Sqlite), pool, EngineConfig::default());
//!     let mut session = engine.new_session(cx).await?;
//!
//!     let mut hero = Hero { name: "Spider-Man".into(), age: 25, ..Hero::default() };
//!     session.insert(cx, &mut hero).await?;
//!
//!     let adults: Vec<Hero> = session.where_("age >= ?", [18]).asc(&["id"]).find(cx).await?;
//!     Outcome::Ok(())
//! }
//! ```

pub mod schema;

pub use sqlbean_core::error::{
    ConsistencyErrorKind, MappingError, QueryErrorKind, ResourceErrorKind,
};
pub use sqlbean_core::{
    Bean, Column, Connection, Cx, Error, FromValue, MapType, MappingErrorKind, NameMapper,
    Outcome, PrefixMapper, PrimaryKey, Result, Row, SameMapper, SnakeMapper, SqlType, Table,
    TableRegistry, Value, primary_key_of, unknown_field,
};

pub use sqlbean_query::{
    BoundSql, Condition, Db2, Dialect, GeneratedKey, IntoArgs, JoinType, Mssql, Mysql, Oracle,
    PlaceholderStyle, Postgres, QuotePolicy, Sqlite, Statement, dialect_for,
};

pub use sqlbean_cache::{CacheStore, CacheValue, Cacher, LruCacher, LruConfig, MemoryStore};

pub use sqlbean_session::{
    Engine, EngineConfig, EngineShared, HookFn, Session, SessionConfig, TxState,
};

pub use sqlbean_pool::{Pool, PoolConfig, PoolStats, PooledConnection};

pub use schema::CreateTable;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use sqlbean::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Bean, Column, Connection, CreateTable, Cx, Engine, EngineConfig, Error, FromValue,
        JoinType, LruConfig, MapType, Outcome, Pool, PoolConfig, PrimaryKey, Result, Row,
        Session, SessionConfig, SqlType, Sqlite, Value, unknown_field,
    };
    pub use std::sync::Arc;
}
