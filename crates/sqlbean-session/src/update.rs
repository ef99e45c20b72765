//! UPDATE: beans, condition beans and map-shaped payloads.

use crate::hooks::{Phase, defer_after, run_after};
use crate::session::Session;
use sqlbean_core::{Bean, Column, Connection, Cx, Error, Outcome, Result, Table, Value, primary_key_of};
use sqlbean_query::{Condition, RenderContext, SetValue, encode_for_column};
use std::sync::Arc;

impl<C: Connection> Session<C> {
    /// Write a bean's meaningfully set fields back to its row.
    ///
    /// Without any chained filter the bean's own primary key picks the row,
    /// provided every key component is set. A version column is bumped in
    /// SET and checked in WHERE, so a stale bean matches nothing. On success
    /// the bean's version and updated stamp follow the row.
    #[tracing::instrument(level = "debug", skip(self, cx, bean), fields(table = B::TABLE_NAME))]
    pub async fn update<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<u64, Error> {
        let outcome = self.update_bean(cx, bean, None).await;
        self.finish();
        outcome
    }

    /// Like [`Session::update`], filtered by the set fields of `condition`.
    #[tracing::instrument(level = "debug", skip(self, cx, bean, condition), fields(table = B::TABLE_NAME))]
    pub async fn update_with<B: Bean>(
        &mut self,
        cx: &Cx,
        bean: &mut B,
        condition: &B,
    ) -> Outcome<u64, Error> {
        let outcome = self.update_bean(cx, bean, Some(condition)).await;
        self.finish();
        outcome
    }

    /// Assign column-name/value pairs on `B`'s table.
    ///
    /// Only the chained filters narrow the rows. The updated column is
    /// stamped and the version bumped unless the pairs name them.
    #[tracing::instrument(level = "debug", skip(self, cx, pairs), fields(table = B::TABLE_NAME))]
    pub async fn update_map<B: Bean>(
        &mut self,
        cx: &Cx,
        pairs: &[(&str, Value)],
    ) -> Outcome<u64, Error> {
        let outcome = self.update_pairs::<B>(cx, pairs).await;
        self.finish();
        outcome
    }

    async fn update_bean<B: Bean>(
        &mut self,
        cx: &Cx,
        bean: &mut B,
        condition: Option<&B>,
    ) -> Outcome<u64, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);

        try_result!(self.hooks.run_before(bean, Phase::Update));
        let values = try_result!(bean.field_values());
        let now = Value::now();
        let auto_time = self.statement.auto_time();

        let mut sets: Vec<(String, SetValue)> = Vec::new();
        let mut user_columns = 0;
        for (column, value) in try_result!(self.statement.update_values(&table, values.clone())) {
            if column.is_updated {
                if !auto_time && !value.is_zero() {
                    sets.push((column.name.to_string(), SetValue::Bind(value)));
                }
                continue;
            }
            user_columns += 1;
            sets.push((column.name.to_string(), SetValue::Bind(value)));
        }
        if user_columns == 0 && self.statement.raw().is_none() {
            tracing::debug!(table = table.name(), "nothing to update");
            return Outcome::Ok(0);
        }
        if auto_time {
            if let Some(updated) = table.updated_column() {
                sets.push((updated.name.to_string(), SetValue::Bind(now.clone())));
            }
        }
        if let Some(version) = table.version_column() {
            sets.push((version.name.to_string(), bump(&ctx, version)));
        }

        let mut extra = Vec::new();
        if let Some(condition) = condition {
            let values = try_result!(condition.field_values());
            extra = try_result!(self.statement.conditions_from_bean(&ctx, &values));
        }
        if extra.is_empty() && !self.statement.has_conditions() && table.primary_key_count() > 0 {
            let key = try_result!(primary_key_of(&table, bean));
            if !key.has_zero() {
                self.statement.id(key);
            }
        }
        let version_value = table
            .version_column()
            .and_then(|v| field_value(&values, v).map(|value| (v, value)));
        if let Some((version, value)) = &version_value {
            if self.statement.version_check() && !value.is_null() {
                extra.push(Condition::new(
                    format!("{} = ?", ctx.column_ref(&version.name, self.statement.has_joins())),
                    vec![value.clone()],
                ));
            }
        }

        let touched = try_outcome!(self.touched(cx, &ctx, &extra).await);
        let bound = try_result!(self.statement.render_update(&ctx, &sets, &extra));
        let affected = try_outcome!(self.run_execute(cx, &bound).await);
        tracing::debug!(table = table.name(), rows = affected, "updated");

        if affected > 0 {
            if let Some((version, value)) = version_value {
                let next = value.as_i64().unwrap_or(0) + 1;
                try_result!(bean.set_field(version.field_name, &Value::BigInt(next)));
            }
            if auto_time {
                if let Some(updated) = table.updated_column() {
                    try_result!(bean.set_field(updated.field_name, &now));
                }
            }
        }

        self.invalidate(table.name(), touched);
        let mut after = std::mem::take(&mut self.hooks.after);
        if self.in_transaction() {
            self.deferred
                .push(defer_after(after, std::slice::from_ref(bean), Phase::Update));
        } else {
            try_result!(run_after(&mut after, bean, Phase::Update));
        }
        Outcome::Ok(affected)
    }

    async fn update_pairs<B: Bean>(&mut self, cx: &Cx, pairs: &[(&str, Value)]) -> Outcome<u64, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);

        if pairs.is_empty() && self.statement.raw().is_none() {
            return Outcome::Ok(0);
        }
        let mut sets = try_result!(map_sets(&table, pairs));
        if self.statement.auto_time() {
            if let Some(updated) = table.updated_column() {
                if !sets.iter().any(|(name, _)| *name == updated.name) {
                    sets.push((updated.name.to_string(), SetValue::Bind(Value::now())));
                }
            }
        }
        if let Some(version) = table.version_column() {
            if !sets.iter().any(|(name, _)| *name == version.name) {
                sets.push((version.name.to_string(), bump(&ctx, version)));
            }
        }

        let touched = try_outcome!(self.touched(cx, &ctx, &[]).await);
        let bound = try_result!(self.statement.render_update(&ctx, &sets, &[]));
        let affected = try_outcome!(self.run_execute(cx, &bound).await);
        tracing::debug!(table = table.name(), rows = affected, "updated");
        self.invalidate(table.name(), touched);
        Outcome::Ok(affected)
    }
}

/// `version + 1`.
fn bump(ctx: &RenderContext<'_>, version: &Column) -> SetValue {
    SetValue::Expr(format!("{} + 1", ctx.quote(&version.name)))
}

fn field_value(values: &[(&'static str, Value)], column: &Column) -> Option<Value> {
    values
        .iter()
        .find(|(field, _)| *field == column.field_name)
        .map(|(_, v)| v.clone())
}

#[allow(clippy::result_large_err)]
fn map_sets(table: &Table, pairs: &[(&str, Value)]) -> Result<Vec<(String, SetValue)>> {
    pairs
        .iter()
        .map(|(name, value)| {
            let column = table.require_column(name)?;
            Ok((
                column.name.to_string(),
                SetValue::Bind(encode_for_column(column, value.clone())?),
            ))
        })
        .collect()
}
