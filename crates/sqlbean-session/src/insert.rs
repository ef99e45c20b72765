//! INSERT: single beans, batches and map-shaped payloads.

use crate::hooks::{Phase, defer_after, run_after};
use crate::session::{Session, Touched};
use sqlbean_core::{Bean, Column, Connection, Cx, Error, Outcome, Result, Table, Value};
use sqlbean_query::{BoundSql, GeneratedKey, RenderContext, encode_for_column, insert_chunk_size};
use std::sync::Arc;

impl<C: Connection> Session<C> {
    /// Insert one bean, writing generated keys, timestamps and the initial
    /// version back into it.
    #[tracing::instrument(level = "debug", skip(self, cx, bean), fields(table = B::TABLE_NAME))]
    pub async fn insert<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<u64, Error> {
        let outcome = self.insert_beans(cx, std::slice::from_mut(bean)).await;
        self.finish();
        outcome
    }

    /// Insert several beans of one type.
    ///
    /// Rows go out in multi-row INSERTs sized to the dialect's bind limit,
    /// or one statement per row when the dialect has no multi-row form. The
    /// column list comes from the first bean. Generated keys are written
    /// back whenever the database reports them per row.
    #[tracing::instrument(level = "debug", skip(self, cx, beans), fields(table = B::TABLE_NAME, rows = beans.len()))]
    pub async fn insert_many<B: Bean>(&mut self, cx: &Cx, beans: &mut [B]) -> Outcome<u64, Error> {
        let outcome = self.insert_beans(cx, beans).await;
        self.finish();
        outcome
    }

    /// Insert one row into `B`'s table from column-name/value pairs.
    ///
    /// No bean hooks run. Created and updated columns not named are stamped
    /// and an unnamed version column starts at 1.
    #[tracing::instrument(level = "debug", skip(self, cx, pairs), fields(table = B::TABLE_NAME))]
    pub async fn insert_map<B: Bean>(
        &mut self,
        cx: &Cx,
        pairs: &[(&str, Value)],
    ) -> Outcome<u64, Error> {
        let outcome = self.insert_pairs::<B>(cx, pairs).await;
        self.finish();
        outcome
    }

    async fn insert_beans<B: Bean>(&mut self, cx: &Cx, beans: &mut [B]) -> Outcome<u64, Error> {
        if beans.is_empty() {
            return Outcome::Ok(0);
        }
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);

        let now = Value::now();
        let auto_time = self.statement.auto_time();
        for bean in beans.iter_mut() {
            try_result!(self.hooks.run_before(bean, Phase::Insert));
            try_result!(stamp_insert(&table, bean, &now, auto_time));
        }

        let first = try_result!(beans[0].field_values());
        let columns: Vec<&Column> = try_result!(self.statement.insert_values(&table, first))
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        let mut rows = Vec::with_capacity(beans.len());
        for bean in beans.iter() {
            let values = try_result!(bean.field_values());
            rows.push(try_result!(row_values(&columns, &values)));
        }

        // The key is generated only when the first row left it unset.
        let key = table
            .auto_increment_column()
            .filter(|k| !columns.iter().any(|c| c.name == k.name));

        let mut affected = 0;
        if self.statement.raw().is_some() {
            let bound = try_result!(self.statement.render_insert(&ctx, &columns, &rows));
            affected = try_outcome!(self.run_execute(cx, &bound).await);
        } else {
            let chunk = insert_chunk_size(ctx.dialect, columns.len());
            let mut start = 0;
            for chunk_rows in rows.chunks(chunk) {
                let bound = try_result!(self.statement.render_insert(&ctx, &columns, chunk_rows));
                let end = start + chunk_rows.len();
                affected += try_outcome!(
                    self.insert_chunk(cx, &ctx, key, &bound, &mut beans[start..end])
                        .await
                );
                start = end;
            }
        }
        tracing::debug!(table = table.name(), rows = affected, "inserted");

        self.invalidate(table.name(), Touched::Nothing);
        let mut after = std::mem::take(&mut self.hooks.after);
        if self.in_transaction() {
            self.deferred.push(defer_after(after, beans, Phase::Insert));
        } else {
            for bean in beans.iter_mut() {
                try_result!(run_after(&mut after, bean, Phase::Insert));
            }
        }
        Outcome::Ok(affected)
    }

    /// Run one INSERT and write generated keys back into its beans.
    async fn insert_chunk<B: Bean>(
        &self,
        cx: &Cx,
        ctx: &RenderContext<'_>,
        key: Option<&Column>,
        bound: &BoundSql,
        beans: &mut [B],
    ) -> Outcome<u64, Error> {
        let Some(key) = key else {
            return self.run_execute(cx, bound).await;
        };
        match ctx.dialect.generated_key() {
            GeneratedKey::Returning | GeneratedKey::Output => {
                let rows = try_outcome!(self.run_query(cx, bound).await);
                for (bean, row) in beans.iter_mut().zip(&rows) {
                    let raw = row.get(0).cloned().unwrap_or(Value::Null);
                    let id = try_result!(ctx.dialect.decode_generated_key(ctx.table, &raw));
                    try_result!(bean.set_field(key.field_name, &id));
                }
                Outcome::Ok(rows.len() as u64)
            }
            GeneratedKey::LastInsertId if beans.len() == 1 => {
                let id = try_outcome!(self.run_insert(cx, bound).await);
                let id = try_result!(
                    ctx.dialect
                        .decode_generated_key(ctx.table, &Value::BigInt(id))
                );
                try_result!(beans[0].set_field(key.field_name, &id));
                Outcome::Ok(1)
            }
            GeneratedKey::Sequence if beans.len() == 1 => {
                let affected = try_outcome!(self.run_execute(cx, bound).await);
                if let Some(sql) = ctx.dialect.sequence_query(ctx.table) {
                    let query = BoundSql {
                        sql,
                        args: Vec::new(),
                    };
                    let rows = try_outcome!(self.run_query(cx, &query).await);
                    let raw = rows
                        .first()
                        .and_then(|row| row.get(0))
                        .cloned()
                        .unwrap_or(Value::Null);
                    let id = try_result!(ctx.dialect.decode_generated_key(ctx.table, &raw));
                    try_result!(beans[0].set_field(key.field_name, &id));
                }
                Outcome::Ok(affected)
            }
            // Multi-row statements whose driver only reports the last id.
            _ => self.run_execute(cx, bound).await,
        }
    }

    async fn insert_pairs<B: Bean>(&mut self, cx: &Cx, pairs: &[(&str, Value)]) -> Outcome<u64, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);

        let mut columns: Vec<&Column> = Vec::with_capacity(pairs.len() + 3);
        let mut values = Vec::with_capacity(pairs.len() + 3);
        for (name, value) in pairs {
            let column = try_result!(table.require_column(name));
            columns.push(column);
            values.push(try_result!(encode_for_column(column, value.clone())));
        }

        let now = Value::now();
        let mut managed: Vec<(&Column, Value)> = Vec::new();
        if self.statement.auto_time() {
            for column in [table.created_column(), table.updated_column()]
                .into_iter()
                .flatten()
            {
                managed.push((column, now.clone()));
            }
        }
        if let Some(version) = table.version_column() {
            managed.push((version, Value::Int(1)));
        }
        for (column, value) in managed {
            if !columns.iter().any(|c| c.name == column.name) {
                columns.push(column);
                values.push(value);
            }
        }

        let bound = try_result!(self.statement.render_insert(&ctx, &columns, &[values]));
        let affected = try_outcome!(self.run_execute(cx, &bound).await);
        self.invalidate(table.name(), Touched::Nothing);
        Outcome::Ok(affected)
    }
}

/// Stamp created/updated columns and start the version at 1.
#[allow(clippy::result_large_err)]
fn stamp_insert<B: Bean>(table: &Table, bean: &mut B, now: &Value, auto_time: bool) -> Result<()> {
    if auto_time {
        for column in [table.created_column(), table.updated_column()]
            .into_iter()
            .flatten()
        {
            bean.set_field(column.field_name, now)?;
        }
    }
    if let Some(version) = table.version_column() {
        bean.set_field(version.field_name, &Value::Int(1))?;
    }
    Ok(())
}

/// One bean's values in `columns` order.
#[allow(clippy::result_large_err)]
fn row_values(columns: &[&Column], values: &[(&'static str, Value)]) -> Result<Vec<Value>> {
    columns
        .iter()
        .map(|column| {
            let value = values
                .iter()
                .find(|(field, _)| *field == column.field_name)
                .map_or(Value::Null, |(_, v)| v.clone());
            encode_for_column(column, value)
        })
        .collect()
}
