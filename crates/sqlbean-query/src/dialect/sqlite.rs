//! SQLite.

use super::Dialect;
use sqlbean_core::{Column, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    // SQLite only knows storage classes; the names pick the column affinity.
    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => {
                "INTEGER".to_string()
            }
            SqlType::Boolean => "INTEGER".to_string(),
            SqlType::Real | SqlType::Double => "REAL".to_string(),
            SqlType::Decimal => "NUMERIC".to_string(),
            SqlType::Char | SqlType::VarChar | SqlType::Text | SqlType::Json => {
                "TEXT".to_string()
            }
            SqlType::Binary | SqlType::VarBinary | SqlType::Blob => "BLOB".to_string(),
            SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp => {
                "DATETIME".to_string()
            }
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["ABORT", "GLOB", "INDEXED", "PRAGMA", "REGEXP", "VACUUM"]
    }

    fn write_limit(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>, _: bool) {
        match (limit, offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
    }

    fn max_bind_params(&self) -> usize {
        32766
    }
}
