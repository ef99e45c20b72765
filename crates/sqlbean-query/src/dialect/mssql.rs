//! Microsoft SQL Server.

use super::{Dialect, GeneratedKey, PlaceholderStyle, common_type_name, decimal, write_fetch};
use sqlbean_core::{Column, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct Mssql;

impl Dialect for Mssql {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_chars(&self) -> (char, char) {
        ('[', ']')
    }

    fn sql_type_name(&self, column: &Column) -> String {
        match column.sql_type {
            SqlType::Integer => "INT".to_string(),
            SqlType::Double => "FLOAT".to_string(),
            SqlType::Decimal => decimal("DECIMAL", column),
            SqlType::Boolean => "BIT".to_string(),
            SqlType::VarChar => format!("NVARCHAR({})", column.length.unwrap_or(255)),
            SqlType::Text | SqlType::Json => "NVARCHAR(MAX)".to_string(),
            SqlType::Blob => "VARBINARY(MAX)".to_string(),
            SqlType::DateTime | SqlType::Timestamp => "DATETIME2".to_string(),
            _ => common_type_name(column),
        }
    }

    fn auto_increment_clause(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        &["IDENTITY", "OPEN", "PERCENT", "PLAN", "PROC", "TOP", "TRAN"]
    }

    fn generated_key(&self) -> GeneratedKey {
        GeneratedKey::Output
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    // OFFSET/FETCH is only legal after an ORDER BY.
    fn write_limit(&self, sql: &mut String, limit: Option<u64>, offset: Option<u64>, has_order: bool) {
        if limit.is_none() && offset.is_none() {
            return;
        }
        if !has_order {
            sql.push_str(" ORDER BY (SELECT NULL)");
        }
        write_fetch(sql, limit, Some(offset.unwrap_or(0)), "NEXT");
    }

    fn begin_sql(&self) -> Option<&'static str> {
        Some("BEGIN TRANSACTION")
    }

    fn max_bind_params(&self) -> usize {
        2100
    }

    fn max_insert_rows(&self) -> Option<usize> {
        Some(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_and_placeholders() {
        assert_eq!(Mssql.generated_key(), GeneratedKey::Output);
        assert_eq!(Mssql.output_clause("[id]"), " OUTPUT INSERTED.[id]");
        assert_eq!(Mssql.placeholder(2), "@p2");
        assert_eq!(
            Mssql.sql_type_name(&Column::new("b", SqlType::Boolean)),
            "BIT"
        );
    }
}
