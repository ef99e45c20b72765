//! Conditions derived from beans, identifiers and the statement's filters.

use crate::render::RenderContext;
use crate::statement::{Condition, Conjunction, Statement};
use sqlbean_core::{Column, Error, MappingErrorKind, Result, Value};

/// Convert a bean value into what gets bound for `column`.
///
/// JSON documents become text for textual and JSON columns and bytes for
/// binary columns; everything else binds unchanged.
#[allow(clippy::result_large_err)]
pub fn encode_for_column(column: &Column, value: Value) -> Result<Value> {
    match value {
        Value::Json(doc) if column.sql_type.is_binary() => serde_json::to_vec(&doc)
            .map(Value::Bytes)
            .map_err(|e| serialize_error(column, &e)),
        Value::Json(doc) => serde_json::to_string(&doc)
            .map(Value::Text)
            .map_err(|e| serialize_error(column, &e)),
        other => Ok(other),
    }
}

fn serialize_error(column: &Column, err: &serde_json::Error) -> Error {
    Error::mapping(
        MappingErrorKind::Serialize,
        None,
        format!("column '{}': {err}", column.name),
    )
}

impl Statement {
    /// `col = ?` for each meaningfully set field of a bean.
    ///
    /// Booleans only count when [`Statement::use_bool`] names them; null,
    /// zero and empty values never count. Write-only and soft-delete columns
    /// are skipped.
    #[allow(clippy::result_large_err)]
    pub fn conditions_from_bean(
        &self,
        ctx: &RenderContext<'_>,
        values: &[(&'static str, Value)],
    ) -> Result<Vec<Condition>> {
        let table = ctx.table;
        let mut conds = Vec::new();
        for (field, value) in values {
            let column = table
                .column_for_field(field)
                .ok_or_else(|| sqlbean_core::unknown_field(table.name(), field))?;
            if !column.map_type.readable() || column.is_deleted {
                continue;
            }
            let included = match value {
                Value::Null => false,
                Value::Bool(_) => self.bool_enabled(&column.name),
                other => !other.is_zero(),
            };
            if !included {
                continue;
            }
            conds.push(Condition::new(
                format!("{} = ?", ctx.column_ref(&column.name, self.has_joins())),
                vec![encode_for_column(column, value.clone())?],
            ));
        }
        Ok(conds)
    }

    /// `pk1 = ? AND pk2 = ?` from the identifier filter.
    #[allow(clippy::result_large_err)]
    pub(crate) fn id_conditions(&self, ctx: &RenderContext<'_>) -> Result<Vec<Condition>> {
        let Some(id) = &self.id else {
            return Ok(Vec::new());
        };
        let table = ctx.table;
        let pk = table.primary_key_columns();
        if pk.is_empty() {
            return Err(Error::mapping(
                MappingErrorKind::NoPrimaryKey,
                Some(table.name()),
                "identifier filter on a table without a primary key",
            ));
        }
        if pk.len() != id.len() {
            return Err(Error::mapping(
                MappingErrorKind::PrimaryKeyArity,
                Some(table.name()),
                format!(
                    "identifier has {} values but the primary key has {} columns",
                    id.len(),
                    pk.len()
                ),
            ));
        }
        pk.into_iter()
            .zip(id.values())
            .map(|(column, value)| {
                Ok(Condition::new(
                    format!("{} = ?", ctx.column_ref(&column.name, self.has_joins())),
                    vec![encode_for_column(column, value.clone())?],
                ))
            })
            .collect()
    }

    /// The chained WHERE/AND/OR fragments as one condition.
    ///
    /// Fragments combine left to right; an OR chain is parenthesized before
    /// a following AND so `a OR b AND c` means `(a OR b) AND c`.
    pub(crate) fn chained_condition(&self) -> Option<Condition> {
        let mut iter = self.conds.iter();
        let (_, first) = iter.next()?;
        if self.conds.len() == 1 {
            return Some(first.clone());
        }

        let mut sql = format!("({})", first.sql);
        let mut args = first.args.clone();
        let mut pending_or = false;
        for (conj, cond) in iter {
            match conj {
                Conjunction::And => {
                    if pending_or {
                        sql = format!("({sql})");
                        pending_or = false;
                    }
                    sql.push_str(&format!(" AND ({})", cond.sql));
                }
                Conjunction::Or => {
                    pending_or = true;
                    sql.push_str(&format!(" OR ({})", cond.sql));
                }
            }
            args.extend(cond.args.iter().cloned());
        }
        Some(Condition::new(sql, args))
    }

    /// IN and NOT IN predicates, IN lists first.
    #[allow(clippy::result_large_err)]
    pub(crate) fn in_conditions(&self, ctx: &RenderContext<'_>) -> Result<Vec<Condition>> {
        let mut conds = Vec::new();
        for list in &self.in_lists {
            if list.values.is_empty() {
                conds.push(Condition::new("1 = 0", Vec::new()));
                continue;
            }
            let column = ctx.resolve_column(&list.column, self.has_joins())?;
            conds.push(in_predicate(&column, "IN", &list.values));
        }
        for list in &self.not_in_lists {
            if list.values.is_empty() {
                continue;
            }
            let column = ctx.resolve_column(&list.column, self.has_joins())?;
            conds.push(in_predicate(&column, "NOT IN", &list.values));
        }
        Ok(conds)
    }
}

fn in_predicate(column: &str, op: &str, values: &[Value]) -> Condition {
    let marks = vec!["?"; values.len()].join(", ");
    Condition::new(format!("{column} {op} ({marks})"), values.to_vec())
}
