//! INSERT, UPDATE and DELETE rendering.

use crate::cond::encode_for_column;
use crate::dialect::{Dialect, GeneratedKey};
use crate::render::{BoundSql, RenderContext};
use crate::statement::{Condition, Statement};
use sqlbean_core::{Column, Error, MappingErrorKind, Result, Table, Value};

/// Right-hand side of one SET assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// `col = ?`
    Bind(Value),
    /// `col = <expr>`, e.g. `version + 1`
    Expr(String),
}

/// How many rows fit in one multi-row INSERT.
pub fn insert_chunk_size(dialect: &dyn Dialect, column_count: usize) -> usize {
    if !dialect.supports_multi_row_insert() {
        return 1;
    }
    let by_params = (dialect.max_bind_params() / column_count.max(1)).max(1);
    dialect
        .max_insert_rows()
        .map_or(by_params, |rows| by_params.min(rows))
}

impl Statement {
    /// Check that every `cols`/`omit` name exists in the table.
    #[allow(clippy::result_large_err)]
    fn validate_projection(&self, table: &Table) -> Result<()> {
        for name in self.cols.iter().chain(&self.omit) {
            if !name.contains('.') && name != "*" {
                table.require_column(name)?;
            }
        }
        Ok(())
    }

    fn projected(&self, column: &Column) -> bool {
        if !self.cols.is_empty() && !Statement::is_listed(&self.cols, &column.name) {
            return false;
        }
        !Statement::is_listed(&self.omit, &column.name)
    }

    /// The columns an INSERT writes for one bean, with encoded values.
    ///
    /// Autoincrement columns are skipped while unset. Created, updated and
    /// version columns bypass `cols`/`omit` so stamping always lands.
    #[allow(clippy::result_large_err)]
    pub fn insert_values<'t>(
        &self,
        table: &'t Table,
        values: Vec<(&'static str, Value)>,
    ) -> Result<Vec<(&'t Column, Value)>> {
        self.validate_projection(table)?;
        let mut out = Vec::with_capacity(values.len());
        for (field, value) in values {
            let column = table
                .column_for_field(field)
                .ok_or_else(|| sqlbean_core::unknown_field(table.name(), field))?;
            if !column.map_type.writable() || column.is_deleted {
                continue;
            }
            if column.is_auto_increment && value.is_zero() {
                continue;
            }
            let managed = column.is_created || column.is_updated || column.is_version;
            if !managed && !self.projected(column) {
                continue;
            }
            out.push((column, encode_for_column(column, value)?));
        }
        Ok(out)
    }

    /// The SET list an UPDATE writes for one bean.
    ///
    /// Keys, created and deleted columns are never written; the version
    /// column is left to the caller. Otherwise `cols` picks columns
    /// explicitly, `all_cols` takes every writable one, and by default only
    /// meaningfully set values are written.
    #[allow(clippy::result_large_err)]
    pub fn update_values<'t>(
        &self,
        table: &'t Table,
        values: Vec<(&'static str, Value)>,
    ) -> Result<Vec<(&'t Column, Value)>> {
        self.validate_projection(table)?;
        let mut out = Vec::with_capacity(values.len());
        for (field, value) in values {
            let column = table
                .column_for_field(field)
                .ok_or_else(|| sqlbean_core::unknown_field(table.name(), field))?;
            if !column.map_type.writable()
                || column.is_primary_key
                || column.is_auto_increment
                || column.is_created
                || column.is_deleted
                || column.is_version
            {
                continue;
            }
            let include = if column.is_updated {
                !value.is_null()
            } else if !self.projected(column) {
                false
            } else if !self.cols.is_empty() || self.all_cols {
                true
            } else {
                match &value {
                    Value::Null => false,
                    Value::Bool(_) => self.bool_enabled(&column.name),
                    other => !other.is_zero(),
                }
            };
            if include {
                out.push((column, encode_for_column(column, value)?));
            }
        }
        Ok(out)
    }

    /// `INSERT INTO t (...) VALUES (...), (...)`.
    ///
    /// Dialects that hand generated keys back in a result set get their
    /// `RETURNING` or `OUTPUT` clause for the autoincrement column.
    #[allow(clippy::result_large_err)]
    pub fn render_insert(
        &self,
        ctx: &RenderContext<'_>,
        columns: &[&Column],
        rows: &[Vec<Value>],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        if rows.is_empty() {
            return Err(Error::Custom("insert without rows".to_string()));
        }

        let key = ctx
            .table
            .auto_increment_column()
            .map(|c| ctx.quote(&c.name));
        let (output, returning) = match (ctx.dialect.generated_key(), &key) {
            (GeneratedKey::Output, Some(k)) => (ctx.dialect.output_clause(k), String::new()),
            (GeneratedKey::Returning, Some(k)) => (String::new(), ctx.dialect.returning_clause(k)),
            _ => (String::new(), String::new()),
        };

        let mut sql = format!("INSERT INTO {}", ctx.table_name());
        if columns.is_empty() {
            if ctx.dialect.name() == "mysql" {
                sql.push_str(" () VALUES ()");
            } else {
                sql.push_str(&output);
                sql.push_str(" DEFAULT VALUES");
            }
            sql.push_str(&returning);
            return Ok(BoundSql {
                sql,
                args: Vec::new(),
            });
        }

        let names = columns
            .iter()
            .map(|c| ctx.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let marks = format!("({})", vec!["?"; columns.len()].join(", "));
        sql.push_str(&format!(" ({names}){output} VALUES "));
        sql.push_str(&vec![marks.as_str(); rows.len()].join(", "));
        sql.push_str(&returning);

        let mut args = Vec::with_capacity(columns.len() * rows.len());
        for row in rows {
            debug_assert_eq!(row.len(), columns.len());
            args.extend(row.iter().cloned());
        }
        Ok(BoundSql { sql, args })
    }

    /// `UPDATE t SET ... WHERE ...`, with the soft-delete filter applied.
    #[allow(clippy::result_large_err)]
    pub fn render_update(
        &self,
        ctx: &RenderContext<'_>,
        sets: &[(String, SetValue)],
        extra: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        if sets.is_empty() {
            return Err(Error::Custom("no columns to update".to_string()));
        }

        let mut args = Vec::new();
        let assignments = sets
            .iter()
            .map(|(column, value)| {
                let quoted = ctx.quote(column);
                match value {
                    SetValue::Bind(v) => {
                        args.push(v.clone());
                        format!("{quoted} = ?")
                    }
                    SetValue::Expr(expr) => format!("{quoted} = {expr}"),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let clause = self.where_clause(ctx, extra, true)?;
        args.extend(clause.args);
        Ok(BoundSql {
            sql: format!("UPDATE {} SET {assignments}{}", ctx.table_name(), clause.sql),
            args,
        })
    }

    /// `DELETE FROM t WHERE ...`. A delete with no condition at all is
    /// refused.
    #[allow(clippy::result_large_err)]
    pub fn render_delete(
        &self,
        ctx: &RenderContext<'_>,
        extra: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        let clause = self.where_clause(ctx, extra, false)?;
        require_condition(ctx, clause.explicit)?;
        Ok(BoundSql {
            sql: format!("DELETE FROM {}{}", ctx.table_name(), clause.sql),
            args: clause.args,
        })
    }

    /// Soft delete: `UPDATE t SET deleted = ? WHERE ... AND deleted IS NULL`.
    #[allow(clippy::result_large_err)]
    pub fn render_soft_delete(
        &self,
        ctx: &RenderContext<'_>,
        deleted: &Column,
        now: Value,
        extra: &[Condition],
    ) -> Result<BoundSql> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone().into());
        }
        let clause = self.where_clause(ctx, extra, true)?;
        require_condition(ctx, clause.explicit)?;
        let mut args = vec![now];
        args.extend(clause.args);
        Ok(BoundSql {
            sql: format!(
                "UPDATE {} SET {} = ?{}",
                ctx.table_name(),
                ctx.quote(&deleted.name),
                clause.sql
            ),
            args,
        })
    }
}

#[allow(clippy::result_large_err)]
fn require_condition(ctx: &RenderContext<'_>, explicit: usize) -> Result<()> {
    if explicit == 0 {
        return Err(Error::mapping(
            MappingErrorKind::MissingCondition,
            Some(ctx.table.name()),
            "refusing to delete without a condition",
        ));
    }
    Ok(())
}
