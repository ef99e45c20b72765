//! SQL dialects.
//!
//! A [`Dialect`] answers every backend-specific question the renderer and the
//! session ask: how identifiers are quoted, what a column type is called,
//! how LIMIT/OFFSET is spelled, which placeholder syntax the driver expects
//! and how a generated key is read back after an INSERT.
//!
//! Statements are always rendered with `?` placeholders and rewritten with
//! [`rewrite_placeholders`] right before they reach a connection.

mod db2;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use db2::Db2;
pub use mssql::Mssql;
pub use mysql::Mysql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use sqlbean_core::error::{ConsistencyError, ConsistencyErrorKind};
use sqlbean_core::{Column, Error, Result, SqlType, Table, Value};
use std::fmt;
use std::sync::Arc;

/// How a dialect hands back the key generated by an INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKey {
    /// The driver reports the last inserted id
    LastInsertId,
    /// `INSERT ... RETURNING pk` yields a row
    Returning,
    /// `INSERT ... OUTPUT INSERTED.pk VALUES ...` yields a row
    Output,
    /// A follow-up query reads the sequence's current value
    Sequence,
}

/// Native bind-parameter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Dollar,
    /// `@p1`, `@p2`, ...
    AtP,
    /// `:1`, `:2`, ...
    Colon,
}

/// When identifiers are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotePolicy {
    /// Quote every identifier
    #[default]
    Always,
    /// Quote only reserved words
    Reserved,
    /// Never quote
    Never,
}

/// Backend-specific SQL rendering rules.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Short lowercase name, e.g. `"postgres"`.
    fn name(&self) -> &'static str;

    /// Opening and closing identifier quote characters.
    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quote one identifier, doubling embedded closing quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let (open, close) = self.quote_chars();
        let mut out = String::with_capacity(name.len() + 2);
        out.push(open);
        for c in name.chars() {
            if c == close {
                out.push(close);
            }
            out.push(c);
        }
        out.push(close);
        out
    }

    /// The literal type name for a column definition.
    fn sql_type_name(&self, column: &Column) -> String {
        common_type_name(column)
    }

    fn supports_multi_row_insert(&self) -> bool {
        true
    }

    /// Column-definition suffix that makes a column autoincrement.
    fn auto_increment_clause(&self) -> &'static str;

    /// Words reserved by this dialect in addition to the common SQL set.
    fn reserved_words(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_reserved_word(&self, word: &str) -> bool {
        COMMON_RESERVED
            .iter()
            .chain(self.reserved_words())
            .any(|w| w.eq_ignore_ascii_case(word))
    }

    fn generated_key(&self) -> GeneratedKey {
        GeneratedKey::LastInsertId
    }

    /// Suffix appended to an INSERT for [`GeneratedKey::Returning`].
    /// `column` is already quoted.
    fn returning_clause(&self, column: &str) -> String {
        format!(" RETURNING {column}")
    }

    /// Clause placed before `VALUES` for [`GeneratedKey::Output`].
    fn output_clause(&self, column: &str) -> String {
        format!(" OUTPUT INSERTED.{column}")
    }

    /// Follow-up query for [`GeneratedKey::Sequence`].
    fn sequence_query(&self, _table: &Table) -> Option<String> {
        None
    }

    /// Normalize a generated key read back from the database.
    #[allow(clippy::result_large_err)]
    fn decode_generated_key(&self, table: &Table, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Err(Error::Consistency(ConsistencyError {
                kind: ConsistencyErrorKind::MissingGeneratedKey,
                table: table.name().to_string(),
                message: "database returned no generated key".to_string(),
            })),
            Value::Text(s) => Ok(s
                .parse::<i64>()
                .map_or_else(|_| value.clone(), Value::BigInt)),
            other => Ok(other.as_i64().map_or_else(|| other.clone(), Value::BigInt)),
        }
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    /// The placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Question => "?".to_string(),
            PlaceholderStyle::Dollar => format!("${index}"),
            PlaceholderStyle::AtP => format!("@p{index}"),
            PlaceholderStyle::Colon => format!(":{index}"),
        }
    }

    /// Append LIMIT/OFFSET to `sql`.
    ///
    /// `has_order` tells dialects that require an ORDER BY before paging
    /// whether one was already written.
    fn write_limit(
        &self,
        sql: &mut String,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_order: bool,
    ) {
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    /// Statement that opens a transaction, or `None` when the backend opens
    /// one implicitly with the first statement.
    fn begin_sql(&self) -> Option<&'static str> {
        Some("BEGIN")
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Most bind parameters one statement may carry.
    fn max_bind_params(&self) -> usize {
        65535
    }

    /// Most rows one `VALUES` list may carry, when the backend caps it.
    fn max_insert_rows(&self) -> Option<usize> {
        None
    }
}

/// Look a built-in dialect up by driver or dialect name.
pub fn dialect_for(name: &str) -> Option<Arc<dyn Dialect>> {
    let dialect: Arc<dyn Dialect> = match name.to_ascii_lowercase().as_str() {
        "mysql" | "mariadb" => Arc::new(Mysql),
        "postgres" | "postgresql" | "pgx" => Arc::new(Postgres),
        "sqlite" | "sqlite3" => Arc::new(Sqlite),
        "mssql" | "sqlserver" => Arc::new(Mssql),
        "oracle" | "oci8" | "godror" => Arc::new(Oracle),
        "db2" => Arc::new(Db2),
        _ => return None,
    };
    Some(dialect)
}

/// Identifier quoting under a [`QuotePolicy`].
#[derive(Clone, Copy)]
pub struct Quoter<'a> {
    dialect: &'a dyn Dialect,
    policy: QuotePolicy,
}

impl<'a> Quoter<'a> {
    pub fn new(dialect: &'a dyn Dialect, policy: QuotePolicy) -> Self {
        Self { dialect, policy }
    }

    /// Quote a possibly table-qualified name (`users.id`).
    ///
    /// `*` and anything that looks like an expression pass through untouched.
    pub fn quote(&self, name: &str) -> String {
        if self.policy == QuotePolicy::Never || is_expression(name) {
            return name.to_string();
        }
        name.split('.')
            .map(|part| self.quote_part(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quote_part(&self, part: &str) -> String {
        let wanted = match self.policy {
            QuotePolicy::Always => true,
            QuotePolicy::Reserved => self.dialect.is_reserved_word(part),
            QuotePolicy::Never => false,
        };
        if wanted && part != "*" {
            self.dialect.quote_identifier(part)
        } else {
            part.to_string()
        }
    }
}

impl fmt::Debug for Quoter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quoter")
            .field("dialect", &self.dialect.name())
            .field("policy", &self.policy)
            .finish()
    }
}

pub(crate) fn is_expression(name: &str) -> bool {
    name == "*"
        || name
            .chars()
            .any(|c| matches!(c, '(' | ')' | ' ' | '"' | '`' | '[' | ','))
}

/// Rewrite `?` placeholders to the dialect's native syntax.
///
/// Question marks inside string literals and quoted identifiers are left
/// alone.
pub fn rewrite_placeholders(sql: &str, dialect: &dyn Dialect) -> String {
    if dialect.placeholder_style() == PlaceholderStyle::Question {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut closing: Option<char> = None;
    let mut index = 0;
    for c in sql.chars() {
        match closing {
            Some(end) => {
                // A doubled quote reopens immediately, so it needs no special case.
                if c == end {
                    closing = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    closing = Some(c);
                    out.push(c);
                }
                '[' => {
                    closing = Some(']');
                    out.push(c);
                }
                '?' => {
                    index += 1;
                    out.push_str(&dialect.placeholder(index));
                }
                _ => out.push(c),
            },
        }
    }
    out
}

// ============================================================================
// Shared Helpers
// ============================================================================

const COMMON_RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN",
    "CONSTRAINT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE",
    "END", "EXISTS", "FOR", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING", "IN", "INDEX", "INNER",
    "INSERT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "ON", "OR",
    "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET", "TABLE", "THEN", "TO",
    "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "WHEN", "WHERE", "WITH",
];

/// ANSI-flavored type names that dialects override piecemeal.
pub(crate) fn common_type_name(column: &Column) -> String {
    match column.sql_type {
        SqlType::TinyInt => "TINYINT".to_string(),
        SqlType::SmallInt => "SMALLINT".to_string(),
        SqlType::Integer => "INTEGER".to_string(),
        SqlType::BigInt => "BIGINT".to_string(),
        SqlType::Real => "REAL".to_string(),
        SqlType::Double => "DOUBLE".to_string(),
        SqlType::Decimal => decimal("DECIMAL", column),
        SqlType::Boolean => "BOOLEAN".to_string(),
        SqlType::Char => sized("CHAR", column.length.unwrap_or(1)),
        SqlType::VarChar => sized("VARCHAR", column.length.unwrap_or(255)),
        SqlType::Text => "TEXT".to_string(),
        SqlType::Binary => sized("BINARY", column.length.unwrap_or(1)),
        SqlType::VarBinary => sized("VARBINARY", column.length.unwrap_or(255)),
        SqlType::Blob => "BLOB".to_string(),
        SqlType::Date => "DATE".to_string(),
        SqlType::Time => "TIME".to_string(),
        SqlType::DateTime => "DATETIME".to_string(),
        SqlType::Timestamp => "TIMESTAMP".to_string(),
        SqlType::Json => "JSON".to_string(),
    }
}

pub(crate) fn sized(name: &str, length: u32) -> String {
    format!("{name}({length})")
}

pub(crate) fn decimal(name: &str, column: &Column) -> String {
    match (column.length, column.length2) {
        (Some(p), Some(s)) => format!("{name}({p},{s})"),
        (Some(p), None) => format!("{name}({p})"),
        _ => name.to_string(),
    }
}

/// `OFFSET n ROWS FETCH ... ROWS ONLY` paging shared by MSSQL, Oracle and DB2.
pub(crate) fn write_fetch(sql: &mut String, limit: Option<u64>, offset: Option<u64>, first: &str) {
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset} ROWS"));
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" FETCH {first} {limit} ROWS ONLY"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Mysql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Mssql.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn quoter_policies() {
        let always = Quoter::new(&Postgres, QuotePolicy::Always);
        assert_eq!(always.quote("users.id"), "\"users\".\"id\"");
        assert_eq!(always.quote("COUNT(*)"), "COUNT(*)");
        assert_eq!(always.quote("users.*"), "\"users\".*");

        let reserved = Quoter::new(&Mysql, QuotePolicy::Reserved);
        assert_eq!(reserved.quote("user"), "`user`");
        assert_eq!(reserved.quote("name"), "name");

        let never = Quoter::new(&Mysql, QuotePolicy::Never);
        assert_eq!(never.quote("order"), "order");
    }

    #[test]
    fn placeholder_rewrite_skips_literals() {
        let sql = "SELECT * FROM \"t?\" WHERE a = ? AND b = '?' AND c = ?";
        assert_eq!(
            rewrite_placeholders(sql, &Postgres),
            "SELECT * FROM \"t?\" WHERE a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(
            rewrite_placeholders("a = ? AND [x?] = ?", &Mssql),
            "a = @p1 AND [x?] = @p2"
        );
        assert_eq!(rewrite_placeholders("a = ?", &Oracle), "a = :1");
        assert_eq!(rewrite_placeholders("a = ?", &Mysql), "a = ?");
    }

    #[test]
    fn escaped_quotes_inside_literals() {
        assert_eq!(
            rewrite_placeholders("a = 'it''s ?' AND b = ?", &Postgres),
            "a = 'it''s ?' AND b = $1"
        );
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(dialect_for("PostgreSQL").map(|d| d.name()), Some("postgres"));
        assert_eq!(dialect_for("sqlite3").map(|d| d.name()), Some("sqlite"));
        assert!(dialect_for("access").is_none());
    }

    #[test]
    fn limit_rendering() {
        let mut sql = String::from("SELECT 1");
        Postgres.write_limit(&mut sql, Some(10), Some(20), false);
        assert_eq!(sql, "SELECT 1 LIMIT 10 OFFSET 20");

        let mut sql = String::from("SELECT 1");
        Mssql.write_limit(&mut sql, Some(10), None, false);
        assert_eq!(sql, "SELECT 1 ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY");

        let mut sql = String::from("SELECT 1 ORDER BY a");
        Oracle.write_limit(&mut sql, Some(5), Some(5), true);
        assert_eq!(sql, "SELECT 1 ORDER BY a OFFSET 5 ROWS FETCH NEXT 5 ROWS ONLY");
    }

    #[test]
    fn generated_key_decoding() {
        let table = Table::new("t", &[], &sqlbean_core::SameMapper);
        assert_eq!(
            Postgres.decode_generated_key(&table, &Value::Int(4)).unwrap(),
            Value::BigInt(4)
        );
        assert_eq!(
            Postgres.decode_generated_key(&table, &Value::from("12")).unwrap(),
            Value::BigInt(12)
        );
        assert!(Postgres.decode_generated_key(&table, &Value::Null).is_err());
    }
}
