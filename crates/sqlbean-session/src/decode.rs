//! Turning result rows back into beans.

use sqlbean_core::{Bean, Column, PrimaryKey, Result, Row, SqlType, Table, Value};

/// Normalize a driver value to what the column declares.
///
/// Drivers without native booleans, timestamps or JSON hand back integers
/// and text; the declared SQL type says what they meant.
pub(crate) fn decode_value(column: &Column, value: Value) -> Value {
    match (column.sql_type, value) {
        (SqlType::Boolean, Value::Int(v)) => Value::Bool(v != 0),
        (SqlType::Boolean, Value::BigInt(v)) => Value::Bool(v != 0),
        (t, Value::Int(v)) if t.is_temporal() => Value::Timestamp(i64::from(v)),
        (t, Value::BigInt(v)) if t.is_temporal() => Value::Timestamp(v),
        (SqlType::Json, Value::Text(s)) => {
            serde_json::from_str::<serde_json::Value>(&s).map_or(Value::Text(s), Value::Json)
        }
        (SqlType::Json, Value::Bytes(b)) => {
            serde_json::from_slice::<serde_json::Value>(&b).map_or(Value::Bytes(b), Value::Json)
        }
        (_, v) => v,
    }
}

/// The column-name/value pairs of a row, decoded against `table`.
///
/// Columns the table does not know (joined or computed) are kept as-is.
pub(crate) fn row_pairs(table: &Table, row: Row) -> Vec<(String, Value)> {
    row.into_pairs()
        .into_iter()
        .map(|(name, value)| {
            let value = match table.column(&name) {
                Some(column) => decode_value(column, value),
                None => value,
            };
            (name, value)
        })
        .collect()
}

/// Store decoded pairs into `bean`. Unknown and write-only columns are
/// skipped.
#[allow(clippy::result_large_err)]
pub(crate) fn fill_bean<B: Bean>(table: &Table, bean: &mut B, pairs: &[(String, Value)]) -> Result<()> {
    for (name, value) in pairs {
        let Some(column) = table.column(name) else {
            continue;
        };
        if !column.map_type.readable() {
            continue;
        }
        bean.set_field(column.field_name, value)?;
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
pub(crate) fn bean_from_pairs<B: Bean>(table: &Table, pairs: &[(String, Value)]) -> Result<B> {
    let mut bean = B::default();
    fill_bean(table, &mut bean, pairs)?;
    Ok(bean)
}

/// A primary key from a row that selected exactly the key columns.
pub(crate) fn key_from_row(row: &Row) -> PrimaryKey {
    PrimaryKey::new(row.iter().map(|(_, v)| v.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::User;

    #[test]
    fn integers_become_declared_types() {
        let table = Table::of::<User>();
        let pairs = row_pairs(
            &table,
            Row::new(
                vec!["active".into(), "created".into(), "extra".into()],
                vec![Value::Int(1), Value::BigInt(99), Value::Int(7)],
            ),
        );
        assert_eq!(
            pairs,
            vec![
                ("active".to_string(), Value::Bool(true)),
                ("created".to_string(), Value::Timestamp(99)),
                ("extra".to_string(), Value::Int(7)),
            ]
        );
    }

    #[test]
    fn json_text_is_parsed() {
        let column = Column::new("tags", SqlType::Json);
        assert_eq!(
            decode_value(&column, Value::from("[1,2]")),
            Value::Json(serde_json::json!([1, 2]))
        );
        assert_eq!(decode_value(&column, Value::from("{oops")), Value::from("{oops"));
    }

    #[test]
    fn fill_skips_unknown_columns() {
        let table = Table::of::<User>();
        let user: User = bean_from_pairs(
            &table,
            &[
                ("ID".to_string(), Value::BigInt(4)),
                ("name".to_string(), Value::from("zoe")),
                ("score".to_string(), Value::Double(1.0)),
            ],
        )
        .unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.name, "zoe");
    }

    #[test]
    fn keys_read_every_column() {
        let row = Row::new(
            vec!["org".into(), "member".into()],
            vec![Value::from("acme"), Value::Int(3)],
        );
        assert_eq!(key_from_row(&row), PrimaryKey::from(("acme", 3_i64)));
    }
}
