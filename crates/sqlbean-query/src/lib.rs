//! Statement builder and SQL dialects for sqlbean.
//!
//! `sqlbean-query` is the **rendering layer**. A [`Statement`] accumulates
//! chained clauses; its `render_*` methods turn that state, a resolved
//! [`Table`](sqlbean_core::Table) and a [`Dialect`] into SQL with `?`
//! placeholders plus positional arguments. Nothing here touches a
//! connection.
//!
//! # Role In The Architecture
//!
//! - **Statement**: chain methods (`where_`, `in_`, `id`, `cols`, ...) and
//!   the pure renderers for SELECT, COUNT, EXIST, INSERT, UPDATE and DELETE.
//! - **Dialects**: quoting, type names, paging, placeholders and generated
//!   key strategies for MySQL, Postgres, SQLite, MSSQL, Oracle and DB2.
//!
//! The session crate drives these renderers and executes the result.

pub mod args;
pub mod builder;
pub mod cond;
pub mod dialect;
pub mod join;
pub mod render;
pub mod statement;

pub use args::IntoArgs;
pub use builder::{SetValue, insert_chunk_size};
pub use cond::encode_for_column;
pub use dialect::{
    Db2, Dialect, GeneratedKey, Mssql, Mysql, Oracle, PlaceholderStyle, Postgres, QuotePolicy,
    Quoter, Sqlite, dialect_for, rewrite_placeholders,
};
pub use join::{Join, JoinType};
pub use render::{BoundSql, RenderContext};
pub use statement::{Condition, Conjunction, Statement};
