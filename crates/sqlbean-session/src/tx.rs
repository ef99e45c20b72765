//! Explicit transactions and session shutdown.

use crate::session::{Session, TxState};
use sqlbean_core::error::ResourceErrorKind;
use sqlbean_core::{Connection, Cx, Error, Outcome};
use sqlbean_query::BoundSql;

impl<C: Connection> Session<C> {
    /// Open a transaction on the session's connection.
    ///
    /// Pending clauses are left alone. A session that already has an open
    /// transaction refuses.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn begin(&mut self, cx: &Cx) -> Outcome<(), Error> {
        try_result!(self.conn());
        if self.in_transaction() {
            return Outcome::Err(Error::resource(
                ResourceErrorKind::AlreadyInTransaction,
                "a transaction is already open on this session",
            ));
        }
        if let Some(sql) = self.shared.dialect().begin_sql() {
            try_outcome!(self.run_execute(cx, &control(sql)).await);
        }
        self.tx = TxState::Open;
        self.deferred.clear();
        Outcome::Ok(())
    }

    /// Commit the open transaction and run the after-hooks its writes
    /// deferred. Without an open transaction this does nothing.
    ///
    /// Every deferred hook runs; the first hook error is returned.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn commit(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if !self.in_transaction() {
            return Outcome::Ok(());
        }
        let sql = self.shared.dialect().commit_sql();
        try_outcome!(self.run_execute(cx, &control(sql)).await);
        self.tx = TxState::Committed;

        let deferred = std::mem::take(&mut self.deferred);
        tracing::debug!(hooks = deferred.len(), "committed");
        let mut first_err = None;
        for work in deferred {
            if let Err(e) = work() {
                first_err.get_or_insert(e);
            }
        }
        self.release_if_auto_close();
        match first_err {
            Some(e) => Outcome::Err(e),
            None => Outcome::Ok(()),
        }
    }

    /// Roll the open transaction back and drop its deferred after-hooks.
    /// Without an open transaction this does nothing.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn rollback(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if !self.in_transaction() {
            return Outcome::Ok(());
        }
        let sql = self.shared.dialect().rollback_sql();
        try_outcome!(self.run_execute(cx, &control(sql)).await);
        self.tx = TxState::RolledBack;
        let dropped = std::mem::take(&mut self.deferred).len();
        tracing::debug!(hooks = dropped, "rolled back");
        self.release_if_auto_close();
        Outcome::Ok(())
    }

    /// Release the connection. Later operations fail with `SessionClosed`;
    /// closing again is a no-op.
    ///
    /// An open transaction is neither committed nor rolled back.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn close(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.in_transaction() {
            tracing::warn!("closing a session with an open transaction");
        }
        self.closed = true;
        self.deferred.clear();
        match self.conn.take() {
            Some(conn) => match conn.close(cx).await {
                Ok(()) => Outcome::Ok(()),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(()),
        }
    }

    fn release_if_auto_close(&mut self) {
        if self.config.auto_close && !self.closed {
            tracing::debug!("auto-closing session");
            self.conn = None;
            self.closed = true;
        }
    }
}

fn control(sql: &str) -> BoundSql {
    BoundSql {
        sql: sql.to_string(),
        args: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::session::TxState;
    use crate::testing::{
        User, block_on, executed_sql, expect_err, mock_session, push_rows, unwrap_outcome,
        user_row,
    };
    use sqlbean_core::error::ResourceErrorKind;
    use sqlbean_core::{Cx, Error};
    use std::sync::{Arc, Mutex};

    #[test]
    fn begin_commit_cycle() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        block_on(async {
            unwrap_outcome(session.commit(&cx).await);
            assert_eq!(session.tx_state(), TxState::AutoCommit);

            unwrap_outcome(session.begin(&cx).await);
            assert!(session.in_transaction());
            let err = expect_err(session.begin(&cx).await);
            assert!(matches!(
                err,
                Error::Resource(ref r) if r.kind == ResourceErrorKind::AlreadyInTransaction
            ));
            unwrap_outcome(session.commit(&cx).await);
            assert_eq!(session.tx_state(), TxState::Committed);
        });
        assert_eq!(executed_sql(&state), vec!["BEGIN", "COMMIT"]);
    }

    #[test]
    fn rollback_drops_deferred_hooks() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        let fired = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&fired);
        block_on(async {
            unwrap_outcome(session.begin(&cx).await);
            session.after(move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
            let mut user = User {
                id: 1,
                name: "z".to_string(),
                ..User::default()
            };
            unwrap_outcome(session.update(&cx, &mut user).await);
            unwrap_outcome(session.rollback(&cx).await);
            unwrap_outcome(session.rollback(&cx).await);
        });
        assert_eq!(*fired.lock().unwrap(), 0);
        assert_eq!(executed_sql(&state).last().unwrap(), "ROLLBACK");
    }

    #[test]
    fn reads_skip_the_cache_inside_a_transaction() {
        let (mut session, state) = mock_session(true);
        let cx = Cx::for_testing();
        push_rows(&state, vec![user_row(1, "a", 1)]);
        push_rows(&state, vec![user_row(1, "a", 1)]);
        block_on(async {
            unwrap_outcome(session.begin(&cx).await);
            unwrap_outcome(session.id(1).find::<User>(&cx).await);
            unwrap_outcome(session.id(1).find::<User>(&cx).await);
        });
        let cacher = session.shared().cacher_for("users").unwrap();
        assert!(cacher.get_bean("users", &1_i64.into()).is_none());
        let selects = executed_sql(&state)
            .into_iter()
            .filter(|s| s.starts_with("SELECT"))
            .count();
        assert_eq!(selects, 2);
    }

    #[test]
    fn pending_clauses_survive_begin() {
        let (mut session, _) = mock_session(false);
        let cx = Cx::for_testing();
        session.where_("age > ?", [1]);
        unwrap_outcome(block_on(session.begin(&cx)));
        assert!(session.statement().has_conditions());
    }

    #[test]
    fn close_is_idempotent_and_keeps_the_transaction_state() {
        let (mut session, _) = mock_session(false);
        let cx = Cx::for_testing();
        block_on(async {
            unwrap_outcome(session.begin(&cx).await);
            unwrap_outcome(session.close(&cx).await);
            unwrap_outcome(session.close(&cx).await);
        });
        assert!(session.is_closed());
        assert_eq!(session.tx_state(), TxState::Open);
    }
}
