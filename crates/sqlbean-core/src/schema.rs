//! Table and column metadata.
//!
//! A bean describes its columns statically with [`Column`] descriptors. The
//! engine resolves those descriptors once per bean type into a [`Table`]
//! (names mapped, primary keys and flag columns indexed) and shares it as an
//! `Arc<Table>` from its [`TableRegistry`].

use crate::bean::Bean;
use crate::error::{Error, MappingErrorKind, Result};
use crate::mapper::{NameMapper, SnakeMapper};
use crate::types::SqlType;
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Which directions a column is mapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapType {
    /// Read from and written to the database
    #[default]
    Both,
    /// Only read from the database; never inserted or updated
    ReadOnly,
    /// Only written to the database; never selected
    WriteOnly,
}

impl MapType {
    pub const fn readable(self) -> bool {
        matches!(self, MapType::Both | MapType::ReadOnly)
    }

    pub const fn writable(self) -> bool {
        matches!(self, MapType::Both | MapType::WriteOnly)
    }
}

/// Metadata about one mapped column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Database column name; empty means "derive from the field name"
    pub name: Cow<'static, str>,
    /// Bean field bound to this column
    pub field_name: &'static str,
    pub sql_type: SqlType,
    /// Length, or precision for decimals
    pub length: Option<u32>,
    /// Scale for decimals
    pub length2: Option<u32>,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    /// Stamped with the current time on insert
    pub is_created: bool,
    /// Stamped with the current time on insert and update
    pub is_updated: bool,
    /// Soft-delete timestamp
    pub is_deleted: bool,
    /// Optimistic-lock counter
    pub is_version: bool,
    pub map_type: MapType,
}

impl Column {
    /// Create a column bound to `field_name`, named by the engine's mapper.
    pub const fn new(field_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name: Cow::Borrowed(""),
            field_name,
            sql_type,
            length: None,
            length2: None,
            nullable: false,
            is_primary_key: false,
            is_auto_increment: false,
            is_created: false,
            is_updated: false,
            is_deleted: false,
            is_version: false,
            map_type: MapType::Both,
        }
    }

    /// Set an explicit database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        // const fns cannot run destructors; the replaced name is always a
        // borrowed `Cow` here, so forgetting it leaks nothing.
        std::mem::forget(std::mem::replace(&mut self.name, Cow::Borrowed(name)));
        self
    }

    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Precision and scale for decimal columns.
    pub const fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.length = Some(precision);
        self.length2 = Some(scale);
        self
    }

    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.is_primary_key = value;
        self
    }

    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.is_auto_increment = value;
        self
    }

    pub const fn created(mut self) -> Self {
        self.is_created = true;
        self
    }

    pub const fn updated(mut self) -> Self {
        self.is_updated = true;
        self
    }

    /// Mark as the soft-delete column. Deleted columns are always nullable.
    pub const fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self.nullable = true;
        self
    }

    pub const fn version(mut self) -> Self {
        self.is_version = true;
        self
    }

    pub const fn map_type(mut self, map_type: MapType) -> Self {
        self.map_type = map_type;
        self
    }
}

/// Resolved metadata for one bean type.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    by_field: HashMap<&'static str, usize>,
    primary_keys: Vec<usize>,
    auto_increment: Option<usize>,
    created: Option<usize>,
    updated: Option<usize>,
    deleted: Option<usize>,
    version: Option<usize>,
}

impl Table {
    /// Resolve column descriptors, naming unnamed columns with `mapper`.
    pub fn new(name: impl Into<String>, columns: &[Column], mapper: &dyn NameMapper) -> Self {
        let mut table = Self {
            name: name.into(),
            columns: Vec::with_capacity(columns.len()),
            by_name: HashMap::with_capacity(columns.len()),
            by_field: HashMap::with_capacity(columns.len()),
            primary_keys: Vec::new(),
            auto_increment: None,
            created: None,
            updated: None,
            deleted: None,
            version: None,
        };

        for (i, col) in columns.iter().enumerate() {
            let mut col = col.clone();
            if col.name.is_empty() {
                col.name = Cow::Owned(mapper.obj_to_table(col.field_name));
            }
            table.by_name.insert(col.name.to_lowercase(), i);
            table.by_field.insert(col.field_name, i);
            if col.is_primary_key {
                table.primary_keys.push(i);
            }
            if col.is_auto_increment {
                table.auto_increment = Some(i);
            }
            if col.is_created {
                table.created = Some(i);
            }
            if col.is_updated {
                table.updated = Some(i);
            }
            if col.is_deleted {
                table.deleted = Some(i);
            }
            if col.is_version {
                table.version = Some(i);
            }
            table.columns.push(col);
        }

        table
    }

    /// Resolve a bean's table with the default snake-case column mapper.
    pub fn of<B: Bean>() -> Self {
        Self::new(B::TABLE_NAME, B::columns(), &SnakeMapper)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look a column up by database name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.columns[i])
    }

    /// Like [`Table::column`], but an unknown name is a mapping error.
    #[allow(clippy::result_large_err)]
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| {
            Error::mapping(
                MappingErrorKind::UnknownColumn,
                Some(&self.name),
                format!("unknown column '{name}'"),
            )
        })
    }

    /// The column bound to a bean field.
    pub fn column_for_field(&self, field: &str) -> Option<&Column> {
        self.by_field.get(field).map(|&i| &self.columns[i])
    }

    /// Primary-key columns in key order.
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.primary_keys.iter().map(|&i| &self.columns[i]).collect()
    }

    pub fn primary_key_count(&self) -> usize {
        self.primary_keys.len()
    }

    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.auto_increment.map(|i| &self.columns[i])
    }

    pub fn created_column(&self) -> Option<&Column> {
        self.created.map(|i| &self.columns[i])
    }

    pub fn updated_column(&self) -> Option<&Column> {
        self.updated.map(|i| &self.columns[i])
    }

    pub fn deleted_column(&self) -> Option<&Column> {
        self.deleted.map(|i| &self.columns[i])
    }

    pub fn version_column(&self) -> Option<&Column> {
        self.version.map(|i| &self.columns[i])
    }
}

/// Per-engine cache of resolved tables, keyed by bean type.
#[derive(Debug)]
pub struct TableRegistry {
    tables: RwLock<HashMap<TypeId, Arc<Table>>>,
    column_mapper: Arc<dyn NameMapper>,
    table_mapper: Arc<dyn NameMapper>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SnakeMapper), Arc::new(crate::mapper::SameMapper))
    }
}

impl TableRegistry {
    pub fn new(column_mapper: Arc<dyn NameMapper>, table_mapper: Arc<dyn NameMapper>) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            column_mapper,
            table_mapper,
        }
    }

    /// The resolved table for `B`, resolving it on first use.
    pub fn table_of<B: Bean>(&self) -> Arc<Table> {
        let key = TypeId::of::<B>();
        if let Some(table) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(table);
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(key).or_insert_with(|| {
            let name = self.table_mapper.obj_to_table(B::TABLE_NAME);
            tracing::debug!(table = %name, columns = B::columns().len(), "resolved bean table");
            Arc::new(Table::new(name, B::columns(), self.column_mapper.as_ref()))
        });
        Arc::clone(table)
    }

    /// Number of resolved tables.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every resolved table.
    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::PrefixMapper;
    use crate::value::Value;

    #[derive(Debug, Default, Clone)]
    struct Account {
        tenant: String,
        number: i64,
        display_name: String,
    }

    static ACCOUNT_COLUMNS: &[Column] = &[
        Column::new("tenant", SqlType::VarChar)
            .length(32)
            .primary_key(true),
        Column::new("number", SqlType::BigInt).primary_key(true),
        Column::new("display_name", SqlType::Text).column("DisplayName"),
    ];

    impl Bean for Account {
        const TABLE_NAME: &'static str = "account";

        fn columns() -> &'static [Column] {
            ACCOUNT_COLUMNS
        }

        fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
            Ok(vec![
                ("tenant", Value::from(&self.tenant)),
                ("number", Value::from(self.number)),
                ("display_name", Value::from(&self.display_name)),
            ])
        }

        fn set_field(&mut self, field: &str, value: &Value) -> Result<()> {
            match field {
                "tenant" => self.tenant = crate::FromValue::from_value(value)?,
                "number" => self.number = crate::FromValue::from_value(value)?,
                "display_name" => self.display_name = crate::FromValue::from_value(value)?,
                other => return Err(crate::bean::unknown_field(Self::TABLE_NAME, other)),
            }
            Ok(())
        }
    }

    #[test]
    fn resolves_composite_keys_and_names() {
        let table = Table::of::<Account>();
        assert_eq!(table.name(), "account");
        assert_eq!(table.primary_key_count(), 2);
        let pk: Vec<_> = table
            .primary_key_columns()
            .iter()
            .map(|c| c.name.to_string())
            .collect();
        assert_eq!(pk, vec!["tenant", "number"]);
        assert!(table.auto_increment_column().is_none());

        assert_eq!(table.column("displayname").unwrap().field_name, "display_name");
        assert_eq!(table.column_for_field("display_name").unwrap().name, "DisplayName");
    }

    #[test]
    fn unknown_column_is_a_mapping_error() {
        let table = Table::of::<Account>();
        let err = table.require_column("balance").unwrap_err();
        assert_eq!(err.mapping_kind(), Some(MappingErrorKind::UnknownColumn));
    }

    #[test]
    fn registry_resolves_once_and_applies_mappers() {
        let registry = TableRegistry::new(
            Arc::new(SnakeMapper),
            Arc::new(PrefixMapper::new("t_", Arc::new(crate::mapper::SameMapper))),
        );
        let first = registry.table_of::<Account>();
        let second = registry.table_of::<Account>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "t_account");
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn deleted_columns_are_nullable() {
        let col = Column::new("deleted_at", SqlType::Timestamp).deleted();
        assert!(col.nullable);
        assert!(MapType::ReadOnly.readable());
        assert!(!MapType::ReadOnly.writable());
        assert!(!MapType::WriteOnly.readable());
    }
}
