//! Oracle Database (12c and later paging).

use super::{Dialect, GeneratedKey, PlaceholderStyle, decimal, sized, write_fetch};
use sqlbean_core::{Column, SqlType, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct Oracle;

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::TinyInt => "NUMBER(3)".to_string(),
            SqlType::SmallInt => "NUMBER(5)".to_string(),
            SqlType::Integer => "NUMBER(10)".to_string(),
            SqlType::BigInt => "NUMBER(19)".to_string(),
            SqlType::Real => "BINARY_FLOAT".to_string(),
            SqlType::Double => "BINARY_DOUBLE".to_string(),
            SqlType::Decimal => decimal("NUMBER", column),
            SqlType::Boolean => "NUMBER(1)".to_string(),
            SqlType::Char => sized("CHAR", column.length.unwrap_or(1)),
            SqlType::VarChar => sized("VARCHAR2", column.length.unwrap_or(255)),
            SqlType::Text | SqlType::Json => "CLOB".to_string(),
            SqlType::Binary | SqlType::VarBinary => sized("RAW", column.length.unwrap_or(255)),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time | SqlType::DateTime | SqlType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn supports_multi_row_insert(&self) -> bool {
        false
    }

    // Keys come from a sequence named after the table.
    fn auto_increment_clause(&self) -> &'static str {
        ""
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["ACCESS", "COMMENT", "LEVEL", "MODE", "NUMBER", "ROWID", "ROWNUM", "SIZE", "UID"]
    }

    fn generated_key(&self) -> GeneratedKey {
        GeneratedKey::Sequence
    }

    fn sequence_query(&self, table: &Table) -> Option<String> {
        let sequence = self.quote_identifier(&format!("SEQ_{}", table.name().to_uppercase()));
        Some(format!("SELECT {sequence}.CURRVAL FROM DUAL"))
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Colon
    }

    fn write_limit(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>, _: bool) {
        write_fetch(sql, limit, offset, "NEXT");
    }

    // Oracle opens a transaction with the first DML statement.
    fn begin_sql(&self) -> Option<&'static str> {
        None
    }

    fn max_bind_params(&self) -> usize {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_follow_up() {
        let table = Table::new("users", &[], &sqlbean_core::SameMapper);
        assert_eq!(
            Oracle.sequence_query(&table).unwrap(),
            "SELECT \"SEQ_USERS\".CURRVAL FROM DUAL"
        );
        assert!(!Oracle.supports_multi_row_insert());
        assert!(Oracle.begin_sql().is_none());
    }
}
