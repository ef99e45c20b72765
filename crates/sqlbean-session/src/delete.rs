//! DELETE, and its soft form.

use crate::hooks::{Phase, defer_after, run_after};
use crate::session::Session;
use sqlbean_core::{Bean, Connection, Cx, Error, Outcome, Value};
use sqlbean_query::RenderContext;
use std::sync::Arc;

impl<C: Connection> Session<C> {
    /// Delete the rows matching the bean's set fields and the chained
    /// filters.
    ///
    /// On a table with a deleted column this stamps the column instead of
    /// removing rows, unless the statement is `unscoped`. A delete with no
    /// condition at all is refused before any SQL is sent.
    #[tracing::instrument(level = "debug", skip(self, cx, bean), fields(table = B::TABLE_NAME))]
    pub async fn delete<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<u64, Error> {
        let outcome = self.delete_bean(cx, bean).await;
        self.finish();
        outcome
    }

    async fn delete_bean<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<u64, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);

        try_result!(self.hooks.run_before(bean, Phase::Delete));
        let values = try_result!(bean.field_values());
        let conds = try_result!(self.statement.conditions_from_bean(&ctx, &values));

        let soft = table
            .deleted_column()
            .filter(|_| !self.statement.is_unscoped());
        let now = Value::now();
        let bound = match soft {
            Some(deleted) => try_result!(self.statement.render_soft_delete(
                &ctx,
                deleted,
                now.clone(),
                &conds
            )),
            None => try_result!(self.statement.render_delete(&ctx, &conds)),
        };
        let touched = try_outcome!(self.touched(cx, &ctx, &conds).await);
        let affected = try_outcome!(self.run_execute(cx, &bound).await);
        tracing::debug!(table = table.name(), rows = affected, soft = soft.is_some(), "deleted");

        if affected > 0 {
            if let Some(deleted) = soft {
                try_result!(bean.set_field(deleted.field_name, &now));
            }
        }

        self.invalidate(table.name(), touched);
        let mut after = std::mem::take(&mut self.hooks.after);
        if self.in_transaction() {
            self.deferred
                .push(defer_after(after, std::slice::from_ref(bean), Phase::Delete));
        } else {
            try_result!(run_after(&mut after, bean, Phase::Delete));
        }
        Outcome::Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{
        Membership, User, block_on, executed_sql, expect_err, mock_session, unwrap_outcome,
    };
    use sqlbean_core::{Cx, MappingErrorKind, PrimaryKey, Value};

    #[test]
    fn soft_delete_stamps_the_deleted_column() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        let mut user = User {
            id: 4,
            ..User::default()
        };
        let affected = unwrap_outcome(block_on(session.delete(&cx, &mut user)));
        assert_eq!(affected, 1);
        assert!(user.deleted.is_some());

        let executed = state.lock().unwrap().executed.clone();
        assert_eq!(
            executed[0].0,
            "UPDATE \"users\" SET \"deleted\" = ? WHERE \"id\" = ? AND \"deleted\" IS NULL"
        );
        assert_eq!(executed[0].1[1], Value::BigInt(4));
    }

    #[test]
    fn unscoped_delete_removes_rows() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        let mut user = User::default();
        unwrap_outcome(block_on(session.unscoped().id(4).delete(&cx, &mut user)));
        assert_eq!(executed_sql(&state)[0], "DELETE FROM \"users\" WHERE \"id\" = ?");
        assert!(user.deleted.is_none());
    }

    #[test]
    fn delete_without_condition_is_refused() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        let mut user = User::default();
        let err = expect_err(block_on(session.delete(&cx, &mut user)));
        assert_eq!(err.mapping_kind(), Some(MappingErrorKind::MissingCondition));

        let mut row = Membership::default();
        let err = expect_err(block_on(session.delete(&cx, &mut row)));
        assert_eq!(err.mapping_kind(), Some(MappingErrorKind::MissingCondition));
        assert!(executed_sql(&state).is_empty());
    }

    #[test]
    fn composite_id_arity_is_checked() {
        let (mut session, state) = mock_session(false);
        let cx = Cx::for_testing();
        let mut row = Membership::default();
        let err = expect_err(block_on(session.id(("acme", 1, 2)).delete(&cx, &mut row)));
        assert_eq!(err.mapping_kind(), Some(MappingErrorKind::PrimaryKeyArity));
        assert!(executed_sql(&state).is_empty());

        unwrap_outcome(block_on(session.id(("acme", 1)).delete(&cx, &mut row)));
        assert_eq!(
            executed_sql(&state)[0],
            "DELETE FROM \"memberships\" WHERE \"org\" = ? AND \"member\" = ?"
        );
    }

    #[test]
    fn delete_by_id_evicts_only_that_bean() {
        let (mut session, _) = mock_session(true);
        let cx = Cx::for_testing();
        let cacher = session.shared().cacher_for("users").unwrap();
        let one = PrimaryKey::from(1_i64);
        let two = PrimaryKey::from(2_i64);
        cacher.put_bean("users", &one, vec![("id".into(), Value::BigInt(1))]);
        cacher.put_bean("users", &two, vec![("id".into(), Value::BigInt(2))]);
        cacher.put_ids("users", "all", vec![one.clone(), two.clone()]);

        let mut user = User::default();
        unwrap_outcome(block_on(session.id(1).delete(&cx, &mut user)));
        assert!(cacher.get_bean("users", &one).is_none());
        assert!(cacher.get_bean("users", &two).is_some());
        assert!(cacher.get_ids("users", "all").is_none());
    }
}
