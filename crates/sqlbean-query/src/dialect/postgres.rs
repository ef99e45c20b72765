//! PostgreSQL.

use super::{Dialect, GeneratedKey, PlaceholderStyle, common_type_name};
use sqlbean_core::{Column, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::Integer if column.is_auto_increment => "SERIAL".to_string(),
            SqlType::BigInt if column.is_auto_increment => "BIGSERIAL".to_string(),
            SqlType::TinyInt => "SMALLINT".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal => super::decimal("NUMERIC", column),
            SqlType::Boolean => "BOOL".to_string(),
            SqlType::Binary | SqlType::VarBinary | SqlType::Blob => "BYTEA".to_string(),
            SqlType::DateTime => "TIMESTAMP".to_string(),
            SqlType::Json => "JSONB".to_string(),
            _ => common_type_name(column),
        }
    }

    // SERIAL types carry the sequence themselves.
    fn auto_increment_clause(&self) -> &'static str {
        ""
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["ANALYSE", "ANALYZE", "ARRAY", "CAST", "OFFSET", "RETURNING", "SYMMETRIC"]
    }

    fn generated_key(&self) -> GeneratedKey {
        GeneratedKey::Returning
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }
}
