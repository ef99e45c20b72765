//! IBM DB2.

use super::{Dialect, GeneratedKey, common_type_name, write_fetch};
use sqlbean_core::{Column, SqlType, Table};

#[derive(Debug, Clone, Copy, Default)]
pub struct Db2;

impl Dialect for Db2 {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::TinyInt | SqlType::Boolean => "SMALLINT".to_string(),
            SqlType::Text | SqlType::Json => "CLOB".to_string(),
            SqlType::Binary | SqlType::VarBinary => {
                format!("VARCHAR({}) FOR BIT DATA", column.length.unwrap_or(255))
            }
            SqlType::DateTime => "TIMESTAMP".to_string(),
            _ => common_type_name(column),
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "GENERATED ALWAYS AS IDENTITY"
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["FETCH", "FIRST", "IDENTITY", "ROWS", "SYSIBM"]
    }

    fn generated_key(&self) -> GeneratedKey {
        GeneratedKey::Sequence
    }

    fn sequence_query(&self, _table: &Table) -> Option<String> {
        Some("SELECT IDENTITY_VAL_LOCAL() FROM SYSIBM.SYSDUMMY1".to_string())
    }

    fn write_limit(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>, _: bool) {
        write_fetch(sql, limit, offset, "FIRST");
    }

    // The driver runs with autocommit off inside a session transaction.
    fn begin_sql(&self) -> Option<&'static str> {
        None
    }

    fn max_bind_params(&self) -> usize {
        32767
    }
}
