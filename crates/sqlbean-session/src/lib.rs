//! Sessions and the engine for sqlbean.
//!
//! `sqlbean-session` is the **execution layer**. A [`Session`] owns one
//! connection and one [`Statement`](sqlbean_query::Statement); each terminal
//! operation renders the accumulated clauses, runs them, decodes the rows
//! into beans, keeps the cache coherent and resets the statement.
//!
//! # Role In The Architecture
//!
//! - **Engine**: owns the dialect, the table registry, the cachers and the
//!   connection pool, and hands out sessions.
//! - **Session**: chain methods forwarded to its statement, plus `insert`,
//!   `update`, `delete`, `get`, `find`, `count`, `exist`, `iterate` and the
//!   raw `exec`/`query` passthroughs.
//! - **Transactions**: `begin`/`commit`/`rollback` on the session's own
//!   connection; after-hooks of writes inside a transaction run on commit.
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::new(Arc::new(Sqlite), pool, EngineConfig::default());
//! let mut session = engine.new_session(&cx).await?;
//!
//! let mut user = User { name: "alice".into(), ..Default::default() };
//! session.insert(&cx, &mut user).await;
//!
//! let adults: Vec<User> = session.where_("age >= ?", [18]).asc(&["id"]).find(&cx).await?;
//! ```

/// Unwrap an `Outcome`, returning early from the enclosing async fn on
/// anything but `Ok`.
macro_rules! try_outcome {
    ($e:expr) => {
        match $e {
            ::asupersync::Outcome::Ok(v) => v,
            ::asupersync::Outcome::Err(e) => return ::asupersync::Outcome::Err(e),
            ::asupersync::Outcome::Cancelled(r) => return ::asupersync::Outcome::Cancelled(r),
            ::asupersync::Outcome::Panicked(p) => return ::asupersync::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
macro_rules! try_result {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return ::asupersync::Outcome::Err(e),
        }
    };
}

pub mod config;
mod decode;
mod delete;
pub mod engine;
mod find;
pub mod hooks;
mod insert;
mod iterate;
mod raw;
pub mod session;
mod tx;
mod update;

pub use config::{EngineConfig, SessionConfig};
pub use engine::{Engine, EngineShared};
pub use hooks::HookFn;
pub use session::{Session, TxState};

#[cfg(test)]
mod testing;
