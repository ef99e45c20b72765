//! SELECT, COUNT and EXIST rendering.
//!
//! Every render entry point is a pure function of the statement, the bean
//! conditions the session derived, and a [`RenderContext`].

use crate::dialect::{Dialect, QuotePolicy, Quoter, is_expression};
use crate::statement::{Condition, Order, Statement};
use sqlbean_core::{Error, MappingErrorKind, Result, Table, Value};

/// Rendered SQL with `?` placeholders and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub args: Vec<Value>,
}

impl From<Condition> for BoundSql {
    fn from(cond: Condition) -> Self {
        Self {
            sql: cond.sql,
            args: cond.args,
        }
    }
}

/// What a statement renders against.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub table: &'a Table,
    pub dialect: &'a dyn Dialect,
    pub policy: QuotePolicy,
}

impl<'a> RenderContext<'a> {
    pub fn new(table: &'a Table, dialect: &'a dyn Dialect, policy: QuotePolicy) -> Self {
        Self {
            table,
            dialect,
            policy,
        }
    }

    pub fn quoter(&self) -> Quoter<'a> {
        Quoter::new(self.dialect, self.policy)
    }

    pub fn quote(&self, name: &str) -> String {
        self.quoter().quote(name)
    }

    /// The quoted table name.
    pub fn table_name(&self) -> String {
        self.quote(self.table.name())
    }

    /// A known column, qualified with the table when `qualify` is set.
    pub fn column_ref(&self, column: &str, qualify: bool) -> String {
        let quoted = self.quote(column);
        if qualify {
            format!("{}.{quoted}", self.table_name())
        } else {
            quoted
        }
    }

    /// Resolve a caller-supplied column name.
    ///
    /// Qualified names and expressions pass through. A bare name must exist
    /// in the table unless the statement joins other tables, since it may
    /// then belong to one of them.
    #[allow(clippy::result_large_err)]
    pub fn resolve_column(&self, name: &str, joined: bool) -> Result<String> {
        if name.contains('.') || is_expression(name) {
            return Ok(self.quote(name));
        }
        match self.table.column(name) {
            Some(column) => Ok(self.column_ref(&column.name, joined)),
            None if joined => Ok(self.quote(name)),
            None => self
                .table
                .require_column(name)
                .map(|column| self.column_ref(&column.name, joined)),
        }
    }
}

/// The assembled WHERE clause.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    pub(crate) sql: String,
    pub(crate) args: Vec<Value>,
    /// Number of predicates that came from the caller rather than scoping
    pub(crate) explicit: usize,
}

impl Statement {
    /// Assemble WHERE from, in order: chained fragments, IN lists, the
    /// identifier filter, `extra`, and the soft-delete filter.
    #[allow(clippy::result_large_err)]
    pub(crate) fn where_clause(
        &self,
        ctx: &RenderContext<'_>,
        extra: &[Condition],
        soft_delete: bool,
    ) -> Result<WhereClause> {
        let mut parts = Vec::new();
        let chained = self.chained_condition();
        let has_chained = chained.is_some();
        parts.extend(chained);
        parts.extend(self.in_conditions(ctx)?);
        parts.extend(self.id_conditions(ctx)?);
        parts.extend(extra.iter().cloned());
        let explicit = parts.len();

        if soft_delete && !self.unscoped {
            if let Some(deleted) = ctx.table.deleted_column() {
                parts.push(Condition::new(
                    format!("{} IS NULL", ctx.column_ref(&deleted.name, self.has_joins())),
                    Vec::new(),
                ));
            }
        }

        if parts.is_empty() {
            return Ok(WhereClause::default());
        }

        let wrap_first = has_chained && parts.len() > 1;
        let mut sql = String::from(" WHERE ");
        let mut args = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            if i == 0 && wrap_first {
                sql.push_str(&format!("({})", part.sql));
            } else {
                sql.push_str(&part.sql);
            }
            args.extend(part.args);
        }
        Ok(WhereClause {
            sql,
            args,
            explicit,
        })
    }

    /// `SELECT` for Get, Find and Iterate.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(level = "trace", skip_all, fields(table = ctx.table.name()))]
    pub fn render_select(
        &self,
        ctx: &RenderContext<'_>,
        bean_conds: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        let projection = self.projection(ctx)?;
        self.render_query(ctx, &projection, bean_conds, true, true)
    }

    /// `SELECT pk...` with the same filters, order and paging as
    /// [`Statement::render_select`].
    #[allow(clippy::result_large_err)]
    pub fn render_primary_keys(
        &self,
        ctx: &RenderContext<'_>,
        bean_conds: &[Condition],
    ) -> Result<BoundSql> {
        let pk = ctx.table.primary_key_columns();
        if pk.is_empty() {
            return Err(Error::mapping(
                MappingErrorKind::NoPrimaryKey,
                Some(ctx.table.name()),
                "table declares no primary key",
            ));
        }
        let projection = pk
            .iter()
            .map(|c| ctx.column_ref(&c.name, self.has_joins()))
            .collect::<Vec<_>>()
            .join(", ");
        self.render_query(ctx, &projection, bean_conds, true, false)
    }

    /// `SELECT COUNT(*)`. DISTINCT and GROUP BY queries are counted through a
    /// subquery.
    #[allow(clippy::result_large_err)]
    pub fn render_count(
        &self,
        ctx: &RenderContext<'_>,
        bean_conds: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        if self.distinct.is_some() || self.group_by.is_some() {
            let projection = self.projection(ctx)?;
            let inner = self.render_query(ctx, &projection, bean_conds, false, true)?;
            return Ok(BoundSql {
                sql: format!("SELECT COUNT(*) FROM ({}) t_count", inner.sql),
                args: inner.args,
            });
        }
        self.render_query(ctx, "COUNT(*)", bean_conds, false, false)
    }

    /// `SELECT 1 ... LIMIT 1`.
    #[allow(clippy::result_large_err)]
    pub fn render_exist(
        &self,
        ctx: &RenderContext<'_>,
        bean_conds: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        let mut bound = self.render_query(ctx, "1", bean_conds, false, false)?;
        ctx.dialect.write_limit(&mut bound.sql, Some(1), None, false);
        Ok(bound)
    }

    #[allow(clippy::result_large_err)]
    fn render_query(
        &self,
        ctx: &RenderContext<'_>,
        projection: &str,
        bean_conds: &[Condition],
        paged: bool,
        distinct: bool,
    ) -> Result<BoundSql> {
        let mut sql = String::from("SELECT ");
        if distinct && self.distinct.is_some() {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(projection);
        sql.push_str(" FROM ");
        sql.push_str(&ctx.table_name());

        let mut args = Vec::new();
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(|name| ctx.quote(name)));
            args.extend(join.args.iter().cloned());
        }

        let clause = self.where_clause(ctx, bean_conds, true)?;
        sql.push_str(&clause.sql);
        args.extend(clause.args);

        if let Some(group_by) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }

        if paged {
            let order = self.order_clause(ctx)?;
            let has_order = !order.is_empty();
            sql.push_str(&order);
            ctx.dialect
                .write_limit(&mut sql, self.limit, self.offset, has_order);
        }

        Ok(BoundSql { sql, args })
    }

    /// The SELECT column list.
    #[allow(clippy::result_large_err)]
    fn projection(&self, ctx: &RenderContext<'_>) -> Result<String> {
        let joined = self.has_joins();
        let names: Vec<String> = match &self.distinct {
            Some(columns) if !columns.is_empty() => columns
                .iter()
                .map(|c| ctx.resolve_column(c, joined))
                .collect::<Result<_>>()?,
            _ if !self.cols.is_empty() => self
                .cols
                .iter()
                .map(|c| ctx.resolve_column(c, joined))
                .collect::<Result<_>>()?,
            _ => {
                if !joined {
                    for name in &self.omit {
                        ctx.table.require_column(name)?;
                    }
                }
                ctx.table
                    .columns()
                    .iter()
                    .filter(|c| c.map_type.readable() && !Statement::is_listed(&self.omit, &c.name))
                    .map(|c| ctx.column_ref(&c.name, joined))
                    .collect()
            }
        };
        if names.is_empty() {
            Ok("*".to_string())
        } else {
            Ok(names.join(", "))
        }
    }

    #[allow(clippy::result_large_err)]
    fn order_clause(&self, ctx: &RenderContext<'_>) -> Result<String> {
        if self.order_by.is_empty() {
            return Ok(String::new());
        }
        let joined = self.has_joins();
        let items = self
            .order_by
            .iter()
            .map(|order| match order {
                Order::Raw(text) => Ok(text.clone()),
                Order::Asc(c) => Ok(format!("{} ASC", ctx.resolve_column(c, joined)?)),
                Order::Desc(c) => Ok(format!("{} DESC", ctx.resolve_column(c, joined)?)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", items.join(", ")))
    }
}
