//! CREATE TABLE statement builder.

use sqlbean_core::Table;
use sqlbean_query::{Dialect, QuotePolicy, Quoter};

/// Builder for the CREATE TABLE statement of a resolved bean table.
///
/// ```ignore
/// let table = engine.table_of::<Hero>();
/// let sql = CreateTable::new(&table).if_not_exists().build(engine.dialect(), QuotePolicy::Always);
/// session.exec(&cx, &sql, ()).await?;
/// ```
#[derive(Debug)]
pub struct CreateTable<'a> {
    table: &'a Table,
    if_not_exists: bool,
}

impl<'a> CreateTable<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            if_not_exists: false,
        }
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Render the statement for `dialect`.
    ///
    /// A single autoincrement key is declared inline with the column; any
    /// other key becomes a table-level PRIMARY KEY constraint.
    pub fn build(&self, dialect: &dyn Dialect, policy: QuotePolicy) -> String {
        let quoter = Quoter::new(dialect, policy);
        let pk = self.table.primary_key_columns();
        let inline_key = pk.len() == 1 && pk[0].is_auto_increment;

        let mut defs = Vec::with_capacity(self.table.columns().len() + 1);
        for column in self.table.columns() {
            let mut def = format!("{} {}", quoter.quote(&column.name), dialect.sql_type_name(column));
            if inline_key && column.is_primary_key {
                def.push_str(" PRIMARY KEY");
                let clause = dialect.auto_increment_clause();
                if !clause.is_empty() {
                    def.push(' ');
                    def.push_str(clause);
                }
            } else if !column.nullable {
                def.push_str(" NOT NULL");
            }
            defs.push(def);
        }
        if !pk.is_empty() && !inline_key {
            let names = pk
                .iter()
                .map(|c| quoter.quote(&c.name))
                .collect::<Vec<_>>()
                .join(", ");
            defs.push(format!("PRIMARY KEY ({names})"));
        }

        let mut sql = String::from("CREATE TABLE ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&quoter.quote(self.table.name()));
        sql.push_str(" (");
        sql.push_str(&defs.join(", "));
        sql.push(')');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbean_core::{Column, SameMapper, SqlType};
    use sqlbean_query::{Mysql, Postgres, Sqlite};

    fn hero() -> Table {
        Table::new(
            "heroes",
            &[
                Column::new("id", SqlType::BigInt)
                    .primary_key(true)
                    .auto_increment(true),
                Column::new("name", SqlType::VarChar).length(64),
                Column::new("retired", SqlType::Timestamp).deleted(),
            ],
            &SameMapper,
        )
    }

    #[test]
    fn inline_autoincrement_key() {
        let table = hero();
        assert_eq!(
            CreateTable::new(&table).build(&Sqlite, QuotePolicy::Always),
            "CREATE TABLE \"heroes\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL, \"retired\" DATETIME)"
        );
        assert_eq!(
            CreateTable::new(&table)
                .if_not_exists()
                .build(&Postgres, QuotePolicy::Never),
            "CREATE TABLE IF NOT EXISTS heroes (id BIGSERIAL PRIMARY KEY, \
             name VARCHAR(64) NOT NULL, retired TIMESTAMP)"
        );
    }

    #[test]
    fn composite_key_constraint() {
        let table = Table::new(
            "memberships",
            &[
                Column::new("org", SqlType::VarChar).primary_key(true),
                Column::new("member", SqlType::BigInt).primary_key(true),
            ],
            &SameMapper,
        );
        assert_eq!(
            CreateTable::new(&table).build(&Mysql, QuotePolicy::Always),
            "CREATE TABLE `memberships` (`org` VARCHAR(255) NOT NULL, \
             `member` BIGINT NOT NULL, PRIMARY KEY (`org`, `member`))"
        );
    }
}
