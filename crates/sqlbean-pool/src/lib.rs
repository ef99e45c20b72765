//! Connection pooling for sqlbean using asupersync.
//!
//! A [`Pool`] hands out [`PooledConnection`]s built by a factory closure, up
//! to `max_connections` at once. A pooled connection goes back to the idle
//! list when dropped, so acquisition is scoped and release is guaranteed.
//! Acquiring from an exhausted pool fails immediately with a pool error.

use asupersync::{Cx, Outcome};
use sqlbean_core::error::{PoolError, PoolErrorKind};
use sqlbean_core::{Connection, Error, Result, Row, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections allowed
    pub max_connections: usize,
    /// Idle connections kept for reuse; extra ones are dropped on release
    pub max_idle: usize,
    /// Ping idle connections before giving them out
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            max_idle: 10,
            test_on_checkout: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with the given max connections.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            max_idle: max_connections,
            ..Default::default()
        }
    }

    pub fn max_idle(mut self, n: usize) -> Self {
        self.max_idle = n;
        self
    }

    /// Enable/disable test on checkout.
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of connections (active + idle)
    pub total_connections: usize,
    /// Number of idle connections
    pub idle_connections: usize,
    /// Number of connections currently handed out
    pub active_connections: usize,
}

type ConnectFn<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

struct PoolInner<C> {
    config: PoolConfig,
    connect: ConnectFn<C>,
    idle: Mutex<Vec<C>>,
    total: AtomicUsize,
    active: AtomicUsize,
    closed: AtomicBool,
}

impl<C> PoolInner<C> {
    fn release(&self, conn: C) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) || idle.len() >= self.config.max_idle {
            drop(idle);
            self.total.fetch_sub(1, Ordering::SeqCst);
            tracing::trace!("dropped released connection");
            return;
        }
        idle.push(conn);
    }

    fn forget(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A bounded connection pool.
pub struct Pool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C: Connection> Pool<C> {
    /// Create a pool that opens connections with `connect`.
    pub fn new<F>(config: PoolConfig, connect: F) -> Self
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(PoolInner {
                config,
                connect: Box::new(connect),
                idle: Mutex::new(Vec::new()),
                total: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the current pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total_connections: self.inner.total.load(Ordering::SeqCst),
            idle_connections: self
                .inner
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            active_connections: self.inner.active.load(Ordering::SeqCst),
        }
    }

    /// Check if the pool is at capacity.
    pub fn at_capacity(&self) -> bool {
        self.inner.total.load(Ordering::SeqCst) >= self.inner.config.max_connections
    }

    /// Check a connection out.
    ///
    /// Reuses an idle connection when one passes the checkout ping, opens a
    /// new one while under `max_connections`, and otherwise fails with
    /// [`PoolErrorKind::Exhausted`].
    pub async fn acquire(&self, cx: &Cx) -> Outcome<PooledConnection<C>, Error> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Outcome::Err(pool_error(PoolErrorKind::Closed, "pool is closed", None));
        }

        loop {
            let candidate = self
                .inner
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop();
            let Some(conn) = candidate else {
                break;
            };
            self.inner.active.fetch_add(1, Ordering::SeqCst);
            if self.inner.config.test_on_checkout && !conn.is_valid(cx).await {
                tracing::debug!("discarding idle connection that failed its ping");
                self.inner.forget();
                continue;
            }
            return Outcome::Ok(self.wrap(conn));
        }

        let reserved = self
            .inner
            .total
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.inner.config.max_connections).then_some(n + 1)
            });
        if reserved.is_err() {
            return Outcome::Err(pool_error(
                PoolErrorKind::Exhausted,
                format!(
                    "all {} connections are in use",
                    self.inner.config.max_connections
                ),
                None,
            ));
        }

        match (self.inner.connect)() {
            Ok(conn) => {
                self.inner.active.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(total = self.inner.total.load(Ordering::SeqCst), "opened pooled connection");
                Outcome::Ok(self.wrap(conn))
            }
            Err(e) => {
                self.inner.total.fetch_sub(1, Ordering::SeqCst);
                Outcome::Err(pool_error(
                    PoolErrorKind::Connect,
                    format!("connection factory failed: {e}"),
                    Some(Box::new(e)),
                ))
            }
        }
    }

    /// Stop handing out connections and drop the idle ones.
    ///
    /// Connections still checked out are dropped when released.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let drained: Vec<C> = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        self.inner.total.fetch_sub(drained.len(), Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn wrap(&self, conn: C) -> PooledConnection<C> {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        }
    }
}

fn pool_error(
    kind: PoolErrorKind,
    message: impl Into<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> Error {
    Error::Pool(PoolError {
        kind,
        message: message.into(),
        source,
    })
}

/// A connection borrowed from a [`Pool`]; returned to it on drop.
pub struct PooledConnection<C> {
    /// `Some` for the guard's whole life. Only `Drop` and `into_inner` take
    /// it, and both consume the guard.
    conn: Option<C>,
    pool: Arc<PoolInner<C>>,
}

impl<C> PooledConnection<C> {
    fn conn(&self) -> &C {
        // A live guard always holds its connection; see the field invariant.
        self.conn
            .as_ref()
            .expect("pooled connection is present until dropped")
    }

    /// Take the connection out of the pool for good.
    pub fn into_inner(mut self) -> C {
        let conn = self
            .conn
            .take()
            .expect("pooled connection is present until dropped");
        self.pool.forget();
        conn
    }
}

impl<C> std::ops::Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.conn()
    }
}

impl<C> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl<C> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("present", &self.conn.is_some())
            .finish()
    }
}

impl<C: Connection> Connection for PooledConnection<C> {
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.conn().query(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.conn().execute(cx, sql, params)
    }

    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        self.conn().insert(cx, sql, params)
    }

    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
        self.conn().ping(cx)
    }

    /// Closing a pooled connection hands it back to the pool.
    async fn close(self, _cx: &Cx) -> Result<()> {
        drop(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;

    #[derive(Debug)]
    struct MockConnection {
        id: i64,
        healthy: Arc<AtomicBool>,
    }

    #[allow(clippy::manual_async_fn)]
    impl Connection for MockConnection {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            let id = self.id;
            async move {
                Outcome::Ok(vec![Row::new(vec!["id".to_string()], vec![Value::BigInt(id)])])
            }
        }

        fn execute(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            async { Outcome::Ok(1) }
        }

        fn insert(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<i64, Error>> + Send {
            async { Outcome::Ok(1) }
        }

        fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send {
            let healthy = self.healthy.load(Ordering::SeqCst);
            async move {
                if healthy {
                    Outcome::Ok(())
                } else {
                    Outcome::Err(Error::Custom("gone".to_string()))
                }
            }
        }

        async fn close(self, _cx: &Cx) -> Result<()> {
            Ok(())
        }
    }

    fn unwrap_outcome<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    }

    fn pool(max: usize, healthy: Arc<AtomicBool>) -> Pool<MockConnection> {
        let next = Arc::new(AtomicI64::new(0));
        Pool::new(PoolConfig::new(max), move || {
            Ok(MockConnection {
                id: next.fetch_add(1, Ordering::SeqCst) + 1,
                healthy: Arc::clone(&healthy),
            })
        })
    }

    #[test]
    fn reuses_released_connections() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let pool = pool(2, Arc::new(AtomicBool::new(true)));

        rt.block_on(async {
            let first = unwrap_outcome(pool.acquire(&cx).await);
            assert_eq!(first.id, 1);
            assert_eq!(pool.stats().active_connections, 1);
            drop(first);
            assert_eq!(pool.stats().idle_connections, 1);

            let again = unwrap_outcome(pool.acquire(&cx).await);
            assert_eq!(again.id, 1);
            let rows = unwrap_outcome(again.query(&cx, "SELECT 1", &[]).await);
            assert_eq!(rows[0].get(0), Some(&Value::BigInt(1)));
        });
    }

    #[test]
    fn exhausted_pool_fails_fast() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let pool = pool(1, Arc::new(AtomicBool::new(true)));

        rt.block_on(async {
            let held = unwrap_outcome(pool.acquire(&cx).await);
            match pool.acquire(&cx).await {
                Outcome::Err(Error::Pool(e)) => assert_eq!(e.kind, PoolErrorKind::Exhausted),
                other => panic!("expected exhausted pool, got {other:?}"),
            }
            assert!(pool.at_capacity());
            drop(held);
            assert!(matches!(pool.acquire(&cx).await, Outcome::Ok(_)));
        });
    }

    #[test]
    fn broken_idle_connections_are_replaced() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let healthy = Arc::new(AtomicBool::new(true));
        let pool = pool(1, Arc::clone(&healthy));

        rt.block_on(async {
            drop(unwrap_outcome(pool.acquire(&cx).await));
            healthy.store(false, Ordering::SeqCst);
            let fresh = unwrap_outcome(pool.acquire(&cx).await);
            assert_eq!(fresh.id, 2);
            assert_eq!(pool.stats().total_connections, 1);
        });
    }

    #[test]
    fn detached_connections_leave_the_pool() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let pool = pool(1, Arc::new(AtomicBool::new(true)));

        rt.block_on(async {
            let guard = unwrap_outcome(pool.acquire(&cx).await);
            assert_eq!(guard.id, 1);
            let conn = guard.into_inner();
            assert_eq!(conn.id, 1);
            assert_eq!(pool.stats(), PoolStats::default());

            let fresh = unwrap_outcome(pool.acquire(&cx).await);
            assert_eq!(fresh.id, 2);
        });
    }

    #[test]
    fn closed_pool_refuses() {
        let rt = asupersync::runtime::RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let pool = pool(2, Arc::new(AtomicBool::new(true)));

        rt.block_on(async {
            let held = unwrap_outcome(pool.acquire(&cx).await);
            pool.close();
            assert!(pool.is_closed());
            drop(held);
            assert_eq!(pool.stats().total_connections, 0);
            assert!(matches!(pool.acquire(&cx).await, Outcome::Err(Error::Pool(_))));
        });
    }
}
