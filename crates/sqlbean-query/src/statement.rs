//! The per-operation statement accumulator.
//!
//! A [`Statement`] collects chained clauses until a terminal operation
//! renders it. It never talks to a connection; the session owns one, renders
//! it through [`RenderContext`](crate::RenderContext) and resets it after
//! every terminal call.

use crate::args::IntoArgs;
use crate::join::{Join, JoinType};
use sqlbean_core::{PrimaryKey, Value};

/// How a condition fragment attaches to the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// A SQL fragment with `?` placeholders and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Condition {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Values collected for one IN / NOT IN column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InList {
    pub(crate) column: String,
    pub(crate) values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Order {
    Raw(String),
    Asc(String),
    Desc(String),
}

/// Accumulated clause state for one operation.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub(crate) raw: Option<Condition>,
    pub(crate) conds: Vec<(Conjunction, Condition)>,
    pub(crate) in_lists: Vec<InList>,
    pub(crate) not_in_lists: Vec<InList>,
    pub(crate) id: Option<PrimaryKey>,
    pub(crate) joins: Vec<Join>,
    pub(crate) group_by: Option<String>,
    pub(crate) having: Option<String>,
    pub(crate) order_by: Vec<Order>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) cols: Vec<String>,
    pub(crate) omit: Vec<String>,
    pub(crate) all_cols: bool,
    pub(crate) use_bool: Option<Vec<String>>,
    pub(crate) distinct: Option<Vec<String>>,
    pub(crate) no_auto_time: bool,
    pub(crate) unscoped: bool,
    pub(crate) no_version_check: bool,
    pub(crate) no_cache: bool,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every clause.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ========================================================================
    // Chain methods
    // ========================================================================

    /// Replace the whole statement with raw SQL.
    ///
    /// Raw SQL wins over every other clause.
    pub fn sql(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.raw = Some(Condition::new(query, args.into_args()));
        self
    }

    /// Add a condition; the first one starts the WHERE clause, later ones
    /// attach with AND.
    pub fn where_(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.and(query, args)
    }

    pub fn and(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.conds
            .push((Conjunction::And, Condition::new(query, args.into_args())));
        self
    }

    pub fn or(&mut self, query: impl Into<String>, args: impl IntoArgs) -> &mut Self {
        self.conds
            .push((Conjunction::Or, Condition::new(query, args.into_args())));
        self
    }

    /// `column IN (...)`. Repeated calls for the same column (compared
    /// case-insensitively) extend one list.
    pub fn in_<V: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        merge_in(&mut self.in_lists, column, values);
        self
    }

    /// `column NOT IN (...)`, merged the same way as [`Statement::in_`].
    pub fn not_in<V: Into<Value>>(
        &mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        merge_in(&mut self.not_in_lists, column, values);
        self
    }

    /// Filter by primary key. Composite keys take a tuple or a `Vec<Value>`.
    pub fn id(&mut self, key: impl Into<PrimaryKey>) -> &mut Self {
        self.id = Some(key.into());
        self
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
        args: impl IntoArgs,
    ) -> &mut Self {
        self.joins
            .push(Join::new(join_type, table, on).args(args.into_args()));
        self
    }

    pub fn group_by(&mut self, keys: impl Into<String>) -> &mut Self {
        self.group_by = Some(keys.into());
        self
    }

    pub fn having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.having = Some(condition.into());
        self
    }

    /// Raw ORDER BY text, appended after earlier orderings.
    pub fn order_by(&mut self, order: impl Into<String>) -> &mut Self {
        self.order_by.push(Order::Raw(order.into()));
        self
    }

    pub fn asc(&mut self, columns: &[&str]) -> &mut Self {
        self.order_by
            .extend(columns.iter().map(|c| Order::Asc((*c).to_string())));
        self
    }

    pub fn desc(&mut self, columns: &[&str]) -> &mut Self {
        self.order_by
            .extend(columns.iter().map(|c| Order::Desc((*c).to_string())));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Restrict SELECT, INSERT and UPDATE to these columns.
    pub fn cols(&mut self, columns: &[&str]) -> &mut Self {
        self.cols.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    /// Leave these columns out of SELECT, INSERT and UPDATE.
    pub fn omit(&mut self, columns: &[&str]) -> &mut Self {
        self.omit.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    /// Update every writable column, set or not.
    pub fn all_cols(&mut self) -> &mut Self {
        self.all_cols = true;
        self
    }

    /// `SELECT DISTINCT` over `columns`, or over the full projection when
    /// empty.
    pub fn distinct(&mut self, columns: &[&str]) -> &mut Self {
        self.distinct = Some(columns.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Let boolean fields take part in bean conditions and updates. With no
    /// columns, every boolean field does.
    pub fn use_bool(&mut self, columns: &[&str]) -> &mut Self {
        let named = self.use_bool.get_or_insert_with(Vec::new);
        named.extend(columns.iter().map(|c| (*c).to_string()));
        if columns.is_empty() {
            named.clear();
        }
        self
    }

    /// Skip created/updated stamping.
    pub fn no_auto_time(&mut self) -> &mut Self {
        self.no_auto_time = true;
        self
    }

    /// See soft-deleted rows and hard-delete them.
    pub fn unscoped(&mut self) -> &mut Self {
        self.unscoped = true;
        self
    }

    pub fn no_version_check(&mut self) -> &mut Self {
        self.no_version_check = true;
        self
    }

    pub fn no_cache(&mut self) -> &mut Self {
        self.no_cache = true;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn raw(&self) -> Option<&Condition> {
        self.raw.as_ref()
    }

    pub fn id_filter(&self) -> Option<&PrimaryKey> {
        self.id.as_ref()
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    /// True when only the identifier filter narrows the statement.
    pub fn is_id_only(&self) -> bool {
        self.id.is_some()
            && self.conds.is_empty()
            && self.in_lists.is_empty()
            && self.not_in_lists.is_empty()
    }

    /// True when no explicit filter was chained.
    pub fn has_conditions(&self) -> bool {
        self.id.is_some()
            || !self.conds.is_empty()
            || !self.in_lists.is_empty()
            || !self.not_in_lists.is_empty()
    }

    pub fn has_order(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn auto_time(&self) -> bool {
        !self.no_auto_time
    }

    pub fn is_unscoped(&self) -> bool {
        self.unscoped
    }

    pub fn version_check(&self) -> bool {
        !self.no_version_check
    }

    pub fn all_cols_enabled(&self) -> bool {
        self.all_cols
    }

    /// Whether results of this statement may be served from and stored in
    /// the cache.
    pub fn cacheable(&self) -> bool {
        self.raw.is_none()
            && self.joins.is_empty()
            && self.group_by.is_none()
            && self.having.is_none()
            && self.distinct.is_none()
            && self.cols.is_empty()
            && self.omit.is_empty()
            && !self.unscoped
            && !self.no_cache
    }

    pub(crate) fn bool_enabled(&self, column: &str) -> bool {
        match &self.use_bool {
            None => false,
            Some(named) => {
                named.is_empty() || named.iter().any(|c| c.eq_ignore_ascii_case(column))
            }
        }
    }

    pub(crate) fn is_listed(list: &[String], column: &str) -> bool {
        list.iter().any(|c| {
            let bare = c.rsplit('.').next().unwrap_or(c);
            bare.eq_ignore_ascii_case(column)
        })
    }
}

fn merge_in<V: Into<Value>>(
    lists: &mut Vec<InList>,
    column: &str,
    values: impl IntoIterator<Item = V>,
) {
    let values = values.into_iter().map(Into::into);
    match lists
        .iter_mut()
        .find(|l| l.column.eq_ignore_ascii_case(column))
    {
        Some(list) => list.values.extend(values),
        None => lists.push(InList {
            column: column.to_string(),
            values: values.collect(),
        }),
    }
}
