//! The session: one connection, one statement, one operation at a time.

use crate::config::SessionConfig;
use crate::decode::key_from_row;
use crate::engine::EngineShared;
use crate::hooks::{Deferred, HookFn, Hooks};
use sqlbean_cache::Cacher;
use sqlbean_core::error::ResourceErrorKind;
use sqlbean_core::{Connection, Cx, Error, Outcome, PrimaryKey, Result, Row, Table, Value};
use sqlbean_query::{
    BoundSql, Condition, IntoArgs, JoinType, RenderContext, Statement, rewrite_placeholders,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Where the session stands with respect to an explicit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// Every statement commits on its own.
    #[default]
    AutoCommit,
    Open,
    Committed,
    RolledBack,
}

/// Executes operations against one connection.
///
/// Chain methods accumulate clauses on the session's statement; the next
/// terminal operation (`insert`, `update`, `delete`, `get`, `find`, `count`,
/// `exist`, `iterate`, `exec`, `query`) consumes them. The statement and the
/// registered closures are reset after every terminal operation, whether it
/// succeeded or not.
pub struct Session<C: Connection> {
    pub(crate) conn: Option<C>,
    pub(crate) shared: Arc<EngineShared>,
    pub(crate) statement: Statement,
    pub(crate) tx: TxState,
    pub(crate) config: SessionConfig,
    pub(crate) hooks: Hooks,
    /// After-hooks of writes made inside the open transaction.
    pub(crate) deferred: Vec<Deferred>,
    pub(crate) closed: bool,
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("statement", &self.statement)
            .field("tx", &self.tx)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("deferred", &self.deferred.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Bean keys a write may have changed.
#[derive(Debug)]
pub(crate) enum Touched {
    /// No cacher to keep coherent.
    Nothing,
    Ids(Vec<PrimaryKey>),
    /// Unknown; every cached bean of the table is suspect.
    All,
}

macro_rules! forward {
    ($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*)) => {
        $(#[$meta])*
        pub fn $name(&mut self, $($arg: $ty),*) -> &mut Self {
            self.statement.$name($($arg),*);
            self
        }
    };
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C, shared: Arc<EngineShared>) -> Self {
        let config = shared.config().session.clone();
        Self::with_config(conn, shared, config)
    }

    pub fn with_config(conn: C, shared: Arc<EngineShared>, config: SessionConfig) -> Self {
        Self {
            conn: Some(conn),
            shared,
            statement: Statement::new(),
            tx: TxState::AutoCommit,
            config,
            hooks: Hooks::default(),
            deferred: Vec::new(),
            closed: false,
        }
    }

    pub fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The clauses accumulated for the next terminal operation.
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn statement_mut(&mut self) -> &mut Statement {
        &mut self.statement
    }

    pub fn tx_state(&self) -> TxState {
        self.tx
    }

    pub fn in_transaction(&self) -> bool {
        self.tx == TxState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========================================================================
    // Chain methods
    // ========================================================================

    /// Replace the next statement with raw SQL.
    pub fn sql(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.statement.sql(query, args);
        self
    }

    pub fn where_(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.statement.where_(query, args);
        self
    }

    pub fn and(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.statement.and(query, args);
        self
    }

    pub fn or(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.statement.or(query, args);
        self
    }

    pub fn in_<V: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.statement.in_(column, values);
        self
    }

    pub fn not_in<V: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.statement.not_in(column, values);
        self
    }

    pub fn id(&mut self, key: impl Into<PrimaryKey>) -> &mut Self {
        self.statement.id(key);
        self
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoArgs,
    ) -> &mut Self {
        self.statement.join(join_type, table, on, args);
        self
    }

    pub fn group_by(&mut self, keys: impl Into<String>) -> &mut Self {
        self.statement.group_by(keys);
        self
    }

    pub fn having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.statement.having(condition);
        self
    }

    pub fn order_by(&mut self, order: impl Into<String>) -> &mut Self {
        self.statement.order_by(order);
        self
    }

    forward!(asc(columns: &[&str]));
    forward!(desc(columns: &[&str]));
    forward!(limit(limit: u64));
    forward!(offset(offset: u64));
    forward!(cols(columns: &[&str]));
    forward!(omit(columns: &[&str]));
    forward!(all_cols());
    forward!(distinct(columns: &[&str]));
    forward!(use_bool(columns: &[&str]));
    forward!(no_auto_time());
    forward!(unscoped());
    forward!(no_version_check());
    forward!(no_cache());

    /// Run `hook` on each bean before the next write, ahead of the bean's
    /// own before-hook.
    pub fn before(
        &mut self,
        hook: impl FnMut(&mut dyn Any) -> Result<()> + Send + 'static,
    ) -> &mut Self {
        self.hooks.before.push(Box::new(hook) as HookFn);
        self
    }

    /// Run `hook` on each bean after the next write succeeds. Inside a
    /// transaction it runs at commit.
    pub fn after(
        &mut self,
        hook: impl FnMut(&mut dyn Any) -> Result<()> + Send + 'static,
    ) -> &mut Self {
        self.hooks.after.push(Box::new(hook) as HookFn);
        self
    }

    // ========================================================================
    // Execution plumbing
    // ========================================================================

    #[allow(clippy::result_large_err)]
    pub(crate) fn conn(&self) -> Result<&C> {
        match &self.conn {
            Some(conn) if !self.closed => Ok(conn),
            _ => Err(Error::resource(
                ResourceErrorKind::SessionClosed,
                "session is closed",
            )),
        }
    }

    /// End a terminal operation: clauses and closures apply to exactly one.
    pub(crate) fn finish(&mut self) {
        self.statement.reset();
        self.hooks.clear();
        if self.config.auto_close && !self.in_transaction() && !self.closed {
            tracing::debug!("auto-closing session");
            self.conn = None;
            self.closed = true;
        }
    }

    fn native(&self, sql: &str) -> String {
        rewrite_placeholders(sql, self.shared.dialect())
    }

    pub(crate) async fn run_query(&self, cx: &Cx, bound: &BoundSql) -> Outcome<Vec<Row>, Error> {
        let conn = try_result!(self.conn());
        let sql = self.native(&bound.sql);
        tracing::debug!(sql = %sql, args = bound.args.len(), "query");
        conn.query(cx, &sql, &bound.args).await
    }

    pub(crate) async fn run_execute(&self, cx: &Cx, bound: &BoundSql) -> Outcome<u64, Error> {
        let conn = try_result!(self.conn());
        let sql = self.native(&bound.sql);
        tracing::debug!(sql = %sql, args = bound.args.len(), "execute");
        conn.execute(cx, &sql, &bound.args).await
    }

    pub(crate) async fn run_insert(&self, cx: &Cx, bound: &BoundSql) -> Outcome<i64, Error> {
        let conn = try_result!(self.conn());
        let sql = self.native(&bound.sql);
        tracing::debug!(sql = %sql, args = bound.args.len(), "insert");
        conn.insert(cx, &sql, &bound.args).await
    }

    /// The cacher reads may use: none for uncacheable statements, inside a
    /// transaction, or for tables without a primary key.
    pub(crate) fn read_cacher(&self, table: &Table) -> Option<Arc<dyn Cacher>> {
        if !self.statement.cacheable() || self.in_transaction() || table.primary_key_count() == 0
        {
            return None;
        }
        self.shared.cacher_for(table.name())
    }

    /// Which cached beans the pending UPDATE or DELETE may change.
    ///
    /// The identifier filter answers directly; otherwise the affected keys
    /// are selected with the same filters before the write runs.
    pub(crate) async fn touched(
        &self,
        cx: &Cx,
        ctx: &RenderContext<'_>,
        extra: &[Condition],
    ) -> Outcome<Touched, Error> {
        if self.shared.cacher_for(ctx.table.name()).is_none() {
            return Outcome::Ok(Touched::Nothing);
        }
        if self.statement.raw().is_some()
            || ctx.table.primary_key_count() == 0
            || (!self.statement.has_conditions() && extra.is_empty())
        {
            return Outcome::Ok(Touched::All);
        }
        if let Some(id) = self.statement.id_filter() {
            return Outcome::Ok(Touched::Ids(vec![id.clone()]));
        }
        let bound = try_result!(self.statement.render_primary_keys(ctx, extra));
        let rows = try_outcome!(self.run_query(cx, &bound).await);
        Outcome::Ok(Touched::Ids(rows.iter().map(key_from_row).collect()))
    }

    /// Keep the cache coherent after a successful write to `table`.
    pub(crate) fn invalidate(&self, table: &str, touched: Touched) {
        let Some(cacher) = self.shared.cacher_for(table) else {
            return;
        };
        cacher.clear_ids(table);
        match touched {
            Touched::Nothing => {}
            Touched::Ids(ids) => {
                for id in &ids {
                    cacher.del_bean(table, id);
                }
            }
            Touched::All => cacher.clear_beans(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{User, block_on, executed_sql, expect_err, mock_session, unwrap_outcome};
    use sqlbean_core::Cx;
    use sqlbean_core::error::ResourceErrorKind;

    #[test]
    fn chain_methods_reach_the_statement() {
        let (mut session, _) = mock_session(false);
        session
            .where_("age > ?", [18])
            .in_("name", ["a", "b"])
            .id(3)
            .limit(5)
            .offset(10)
            .no_cache();
        let stmt = session.statement();
        assert!(stmt.has_conditions());
        assert_eq!(stmt.limit_value(), Some(5));
        assert_eq!(stmt.offset_value(), Some(10));
        assert!(!stmt.cacheable());
    }

    #[test]
    fn clauses_reset_after_terminal_operation() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        block_on(async {
            session.where_("age > ?", [18]).limit(1);
            unwrap_outcome(session.find::<User>(&cx).await);
            assert!(!session.statement().has_conditions());

            unwrap_outcome(session.find::<User>(&cx).await);
        });
        let sql = executed_sql(&state);
        assert!(sql[0].contains("WHERE (age > ?)") || sql[0].contains("WHERE age > ?"));
        assert!(!sql[1].contains("age > ?"));
        assert!(!sql[1].contains("LIMIT"));
    }

    #[test]
    fn clauses_reset_after_failed_operation() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        block_on(async {
            session.where_("age > ?", [18]).id((1, 2));
            let err = expect_err(session.find::<User>(&cx).await);
            assert!(err.is_mapping());
            assert!(!session.statement().has_conditions());
        });
        assert!(executed_sql(&state).is_empty());
    }

    #[test]
    fn closed_session_refuses_work() {
        let (mut session, _) = mock_session(false);
        let cx = Cx::for_testing();
        block_on(async {
            unwrap_outcome(session.close(&cx).await);
            assert!(session.is_closed());
            let err = expect_err(session.count::<User>(&cx).await);
            assert!(matches!(
                err,
                sqlbean_core::Error::Resource(ref r) if r.kind == ResourceErrorKind::SessionClosed
            ));
        });
    }
}
