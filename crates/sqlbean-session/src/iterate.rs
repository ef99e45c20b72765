//! Paged iteration over a Find.

use crate::decode::{bean_from_pairs, row_pairs};
use crate::session::Session;
use sqlbean_core::{Bean, Connection, Cx, Error, Outcome, Result, Row, Table};
use sqlbean_query::RenderContext;
use std::sync::Arc;

impl<C: Connection> Session<C> {
    /// Call `f` with the index and bean of every row Find would return,
    /// reading `iterate_buffer_size` rows per query.
    ///
    /// Pages are ordered by primary key unless an order was chained. A
    /// buffer size of zero, or raw SQL, reads everything in one query. The
    /// first error from `f` or the driver stops the walk. Returns the number
    /// of rows handed to `f`.
    #[tracing::instrument(level = "debug", skip(self, cx, f), fields(table = B::TABLE_NAME))]
    pub async fn iterate<B, F>(&mut self, cx: &Cx, f: F) -> Outcome<u64, Error>
    where
        B: Bean,
        F: FnMut(usize, B) -> Result<()>,
    {
        let outcome = self.iterate_rows(cx, f).await;
        self.finish();
        outcome
    }

    async fn iterate_rows<B, F>(&mut self, cx: &Cx, mut f: F) -> Outcome<u64, Error>
    where
        B: Bean,
        F: FnMut(usize, B) -> Result<()>,
    {
        try_result!(self.conn());
        let shared = Arc::clone(&self.shared);
        let table = shared.table_of::<B>();
        let ctx = RenderContext::new(&table, shared.dialect(), shared.config().quote_policy);
        let page = shared.config().iterate_buffer_size;

        if page == 0 || self.statement.raw().is_some() {
            let bound = try_result!(self.statement.render_select(&ctx, &[]));
            let rows = try_outcome!(self.run_query(cx, &bound).await);
            let mut seen = 0;
            try_result!(feed(&table, rows, &mut seen, &mut f));
            return Outcome::Ok(seen);
        }

        let mut statement = self.statement.clone();
        if !statement.has_order() {
            let keys: Vec<&str> = table
                .primary_key_columns()
                .iter()
                .map(|c| c.name.as_ref())
                .collect();
            statement.asc(&keys);
        }
        let start = statement.offset_value().unwrap_or(0);
        let cap = statement.limit_value();

        let mut seen = 0;
        loop {
            let want = cap.map_or(page, |cap| page.min(cap - seen));
            if want == 0 {
                break;
            }
            statement.limit(want);
            if start + seen > 0 {
                statement.offset(start + seen);
            }
            let bound = try_result!(statement.render_select(&ctx, &[]));
            let rows = try_outcome!(self.run_query(cx, &bound).await);
            let fetched = rows.len() as u64;
            tracing::debug!(table = table.name(), rows = fetched, offset = start + seen, "page");
            try_result!(feed(&table, rows, &mut seen, &mut f));
            if fetched < want {
                break;
            }
        }
        Outcome::Ok(seen)
    }
}

#[allow(clippy::result_large_err)]
fn feed<B, F>(table: &Table, rows: Vec<Row>, seen: &mut u64, f: &mut F) -> Result<()>
where
    B: Bean,
    F: FnMut(usize, B) -> Result<()>,
{
    for row in rows {
        let bean = bean_from_pairs(table, &row_pairs(table, row))?;
        let index = usize::try_from(*seen).unwrap_or(usize::MAX);
        f(index, bean)?;
        *seen += 1;
    }
    Ok(())
}
