//! Reads: get, find, count and exist.

use crate::decode::{bean_from_pairs, fill_bean, key_from_row, row_pairs};
use crate::session::Session;
use sqlbean_cache::{Cacher, cache_key};
use sqlbean_core::error::{ConsistencyError, ConsistencyErrorKind};
use sqlbean_core::{Bean, Connection, Cx, Error, Outcome, PrimaryKey, Value, primary_key_of};
use sqlbean_query::{Condition, RenderContext, Statement};
use std::collections::HashMap;
use std::sync::Arc;

/// Decoded column-name/value pairs of one selected row.
pub(crate) type Pairs = Vec<(String, Value)>;

impl<C: Connection> Session<C> {
    /// Load the single row matching the bean's set fields and the chained
    /// filters into the bean.
    ///
    /// Returns `false` when nothing matches. More than one match is a
    /// consistency error and leaves the bean untouched.
    #[tracing::instrument(level = "debug", skip(self, cx, bean), fields(table = B::TABLE_NAME))]
    pub async fn get<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<bool, Error> {
        let outcome = self.get_bean(cx, bean).await;
        self.finish();
        outcome
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = B::TABLE_NAME))]
    pub async fn find<B: Bean>(&mut self, cx: &Cx) -> Outcome<Vec<B>, Error> {
        let outcome = self.find_beans::<B>(cx, None).await;
        self.finish();
        outcome
    }

    /// Find, additionally filtered by the set fields of `condition`.
    #[tracing::instrument(level = "debug", skip(self, cx, condition), fields(table = B::TABLE_NAME))]
    pub async fn find_with<B: Bean>(&mut self, cx: &Cx, condition: &B) -> Outcome<Vec<B>, Error> {
        let outcome = self.find_beans(cx, Some(condition)).await;
        self.finish();
        outcome
    }

    /// Find, keyed by each bean's primary key.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = B::TABLE_NAME))]
    pub async fn find_map<B: Bean>(&mut self, cx: &Cx) -> Outcome<HashMap<PrimaryKey, B>, Error> {
        let outcome = self.find_keyed::<B>(cx).await;
        self.finish();
        outcome
    }

    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = B::TABLE_NAME))]
    pub async fn count<B: Bean>(&mut self, cx: &Cx) -> Outcome<u64, Error> {
        let outcome = self.count_rows::<B>(cx, None).await;
        self.finish();
        outcome
    }

    #[tracing::instrument(level = "debug", skip(self, cx, condition), fields(table = B::TABLE_NAME))]
    pub async fn count_with<B: Bean>(&mut self, cx: &Cx, condition: &B) -> Outcome<u64, Error> {
        let outcome = self.count_rows(cx, Some(condition)).await;
        self.finish();
        outcome
    }

    /// Whether any row matches the chained filters.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(table = B::TABLE_NAME))]
    pub async fn exist<B: Bean>(&mut self, cx: &Cx) -> Outcome<bool, Error> {
        let outcome = self.exist_rows::<B>(cx).await;
        self.finish();
        outcome
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn get_bean<B: Bean>(&mut self, cx: &Cx, bean: &mut B) -> Outcome<bool, Error> {
        if self.statement.limit_value().is_none() && self.statement.raw().is_none() {
            self.statement.limit(2);
        }
        let mut rows = try_outcome!(self.select_pairs(cx, Some(&*bean)).await);
        match rows.len() {
            0 => Outcome::Ok(false),
            1 => {
                let table = self.shared.table_of::<B>();
                let pairs = rows.remove(0);
                try_result!(fill_bean(&table, bean, &pairs));
                Outcome::Ok(true)
            }
            n => Outcome::Err(Error::Consistency(ConsistencyError {
                kind: ConsistencyErrorKind::MultipleRows,
                table: B::TABLE_NAME.to_string(),
                message: format!("expected at most one row, got {n}"),
            })),
        }
    }

    async fn find_beans<B: Bean>(&mut self, cx: &Cx, condition: Option<&B>) -> Outcome<Vec<B>, Error> {
        let rows = try_outcome!(self.select_pairs(cx, condition).await);
        let table = self.shared.table_of::<B>();
        let beans = try_result!(
            rows.iter()
                .map(|pairs| bean_from_pairs(&table, pairs))
                .collect::<sqlbean_core::Result<Vec<B>>>()
        );
        tracing::debug!(table = table.name(), rows = beans.len(), "found");
        Outcome::Ok(beans)
    }

    async fn find_keyed<B: Bean>(&mut self, cx: &Cx) -> Outcome<HashMap<PrimaryKey, B>, Error> {
        let beans = try_outcome!(self.find_beans::<B>(cx, None).await);
        let table = self.shared.table_of::<B>();
        let mut map = HashMap::with_capacity(beans.len());
        for bean in beans {
            let key = try_result!(primary_key_of(&table, &bean));
            map.insert(key, bean);
        }
        Outcome::Ok(map)
    }

    async fn count_rows<B: Bean>(&mut self, cx: &Cx, condition: Option<&B>) -> Outcome<u64, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);
        let conds = try_result!(self.bean_conditions(&ctx, condition));
        let bound = try_result!(self.statement.render_count(&ctx, &conds));
        let rows = try_outcome!(self.run_query(cx, &bound).await);
        let count = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn exist_rows<B: Bean>(&mut self, cx: &Cx) -> Outcome<bool, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);
        let bound = try_result!(self.statement.render_exist(&ctx, &[]));
        let rows = try_outcome!(self.run_query(cx, &bound).await);
        Outcome::Ok(!rows.is_empty())
    }

    #[allow(clippy::result_large_err)]
    fn bean_conditions<B: Bean>(
        &self,
        ctx: &RenderContext<'_>,
        condition: Option<&B>,
    ) -> sqlbean_core::Result<Vec<Condition>> {
        match condition {
            Some(bean) => self.statement.conditions_from_bean(ctx, &bean.field_values()?),
            None => Ok(Vec::new()),
        }
    }

    /// The decoded rows a read selects, through the cache when allowed.
    pub(crate) async fn select_pairs<B: Bean>(
        &self,
        cx: &Cx,
        condition: Option<&B>,
    ) -> Outcome<Vec<Pairs>, Error> {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);
        let conds = try_result!(self.bean_conditions(&ctx, condition));

        if let Some(cacher) = self.read_cacher(&table) {
            return self.cached_pairs(cx, &ctx, cacher.as_ref(), &conds).await;
        }
        let bound = try_result!(self.statement.render_select(&ctx, &conds));
        let rows = try_outcome!(self.run_query(cx, &bound).await);
        Outcome::Ok(rows.into_iter().map(|row| row_pairs(&table, row)).collect())
    }

    /// Resolve the matching keys through the id-list cache, then each key
    /// through the bean cache, reading misses one key at a time.
    async fn cached_pairs(
        &self,
        cx: &Cx,
        ctx: &RenderContext<'_>,
        cacher: &dyn Cacher,
        conds: &[Condition],
    ) -> Outcome<Vec<Pairs>, Error> {
        let table = ctx.table.name();
        let shortcut = self.statement.id_filter().filter(|id| {
            conds.is_empty()
                && self.statement.is_id_only()
                && self.statement.offset_value().is_none()
                && self.statement.limit_value() != Some(0)
                && id.len() == ctx.table.primary_key_count()
        });
        let ids = if let Some(id) = shortcut {
            vec![id.clone()]
        } else {
            let bound = try_result!(self.statement.render_primary_keys(ctx, conds));
            let key = cache_key(&bound.sql, &bound.args);
            if let Some(ids) = cacher.get_ids(table, &key) {
                tracing::trace!(table, ids = ids.len(), "id list cache hit");
                ids
            } else {
                let rows = try_outcome!(self.run_query(cx, &bound).await);
                let ids: Vec<PrimaryKey> = rows.iter().map(key_from_row).collect();
                cacher.put_ids(table, &key, ids.clone());
                ids
            }
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(pairs) = cacher.get_bean(table, id) {
                tracing::trace!(table, id = %id.key_string(), "bean cache hit");
                out.push(pairs);
                continue;
            }
            let mut by_id = Statement::new();
            by_id.id(id.clone());
            let bound = try_result!(by_id.render_select(ctx, &[]));
            let rows = try_outcome!(self.run_query(cx, &bound).await);
            if let Some(row) = rows.into_iter().next() {
                let pairs = row_pairs(ctx.table, row);
                cacher.put_bean(table, id, pairs.clone());
                out.push(pairs);
            }
        }
        Outcome::Ok(out)
    }
}
