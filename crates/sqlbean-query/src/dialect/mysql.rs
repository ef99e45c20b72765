//! MySQL and MariaDB.

use super::{Dialect, common_type_name, decimal, sized};
use sqlbean_core::{Column, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Dialect for Mysql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_chars(&self) -> (char, char) {
        ('`', '`')
    }

    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::Integer => "INT".to_string(),
            SqlType::Real => "FLOAT".to_string(),
            SqlType::Decimal => decimal("DECIMAL", column),
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::Text if column.length.is_some_and(|l| l > 65535) => "LONGTEXT".to_string(),
            SqlType::VarBinary => sized("VARBINARY", column.length.unwrap_or(255)),
            SqlType::Timestamp => "DATETIME(6)".to_string(),
            _ => common_type_name(column),
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["DATABASE", "DIV", "INTERVAL", "LOCK", "MOD", "RANGE", "READ", "REGEXP", "STATUS"]
    }

    fn write_limit(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>, _: bool) {
        match (limit, offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // MySQL has no OFFSET without LIMIT.
            (None, Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX));
            }
            (None, None) => {}
        }
    }
}
