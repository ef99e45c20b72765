//! Raw SQL passthrough.

use crate::session::Session;
use sqlbean_core::{Connection, Cx, Error, Outcome, Row};
use sqlbean_query::{BoundSql, IntoArgs};

impl<C: Connection> Session<C> {
    /// Execute a statement written with `?` placeholders and return the rows
    /// affected. The cache is not consulted or invalidated.
    #[tracing::instrument(level = "debug", skip(self, cx, args))]
    pub async fn exec(&mut self, cx: &Cx, sql: &str, args: impl IntoArgs) -> Outcome<u64, Error> {
        let bound = BoundSql {
            sql: sql.to_string(),
            args: args.into_args(),
        };
        let outcome = self.run_execute(cx, &bound).await;
        self.finish();
        outcome
    }

    /// Run a query written with `?` placeholders and return its rows as-is.
    #[tracing::instrument(level = "debug", skip(self, cx, args))]
    pub async fn query(&mut self, cx: &Cx, sql: &str, args: impl IntoArgs) -> Outcome<Vec<Row>, Error> {
        let bound = BoundSql {
            sql: sql.to_string(),
            args: args.into_args(),
        };
        let outcome = self.run_query(cx, &bound).await;
        self.finish();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{EngineConfig, SessionConfig};
    use crate::engine::EngineShared;
    use crate::session::Session;
    use crate::testing::{MockConnection, block_on, executed_sql, push_rows, unwrap_outcome, user_row};
    use sqlbean_core::{Cx, Value};
    use sqlbean_query::Postgres;
    use std::sync::Arc;

    #[test]
    fn placeholders_follow_the_dialect() {
        let shared = Arc::new(EngineShared::new(Arc::new(Postgres), EngineConfig::default()));
        let conn = MockConnection::default();
        let state = Arc::clone(&conn.state);
        let mut session = Session::new(conn, shared);
        let cx = Cx::for_testing();

        push_rows(&state, vec![user_row(1, "a", 1)]);
        let rows = unwrap_outcome(block_on(session.query(
            &cx,
            "SELECT * FROM users WHERE name = ? AND note <> '?' AND age > ?",
            [Value::from("a"), Value::Int(3)],
        )));
        assert_eq!(rows.len(), 1);
        let affected = unwrap_outcome(block_on(session.exec(&cx, "DELETE FROM users WHERE id = ?", [1])));
        assert_eq!(affected, 1);

        let sql = executed_sql(&state);
        assert_eq!(
            sql[0],
            "SELECT * FROM users WHERE name = $1 AND note <> '?' AND age > $2"
        );
        assert_eq!(sql[1], "DELETE FROM users WHERE id = $1");
    }

    #[test]
    fn auto_close_releases_after_one_operation() {
        let shared = Arc::new(EngineShared::new(
            Arc::new(sqlbean_query::Sqlite),
            EngineConfig::default(),
        ));
        let mut session = Session::with_config(
            MockConnection::default(),
            shared,
            SessionConfig::new().auto_close(true),
        );
        let cx = Cx::for_testing();
        unwrap_outcome(block_on(session.exec(&cx, "DELETE FROM users", ())));
        assert!(session.is_closed());
        assert!(matches!(
            block_on(session.exec(&cx, "DELETE FROM users", ())),
            sqlbean_core::Outcome::Err(_)
        ));
    }
}
