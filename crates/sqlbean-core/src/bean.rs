//! The `Bean` trait and primary-key values.

use crate::error::{Error, MappingErrorKind, Result};
use crate::schema::{Column, Table};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A record type mapped to one table.
///
/// Implementations describe their columns statically and move values in and
/// out by field name; the session does everything else through the resolved
/// [`Table`].
///
/// # Example
///
/// ```ignore
/// static USER_COLUMNS: &[Column] = &[
///     Column::new("id", SqlType::BigInt).primary_key(true).auto_increment(true),
///     Column::new("username", SqlType::VarChar).length(64),
/// ];
///
/// impl Bean for User {
///     const TABLE_NAME: &'static str = "users";
///     fn columns() -> &'static [Column] { USER_COLUMNS }
///     fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
///         Ok(vec![("id", self.id.into()), ("username", (&self.username).into())])
///     }
///     fn set_field(&mut self, field: &str, value: &Value) -> Result<()> {
///         match field {
///             "id" => self.id = FromValue::from_value(value)?,
///             "username" => self.username = FromValue::from_value(value)?,
///             other => return Err(unknown_field(Self::TABLE_NAME, other)),
///         }
///         Ok(())
///     }
/// }
/// ```
#[allow(clippy::result_large_err)]
pub trait Bean: Default + Clone + Send + Sync + 'static {
    /// Table name before the engine's table mapper is applied.
    const TABLE_NAME: &'static str;

    /// Static column descriptors, in the order fields are reported.
    fn columns() -> &'static [Column];

    /// Current field values keyed by field name.
    ///
    /// Slice and map fields serialize to [`Value::Json`] here, so this can
    /// fail.
    fn field_values(&self) -> Result<Vec<(&'static str, Value)>>;

    /// Store one decoded column value into its field.
    fn set_field(&mut self, field: &str, value: &Value) -> Result<()>;

    fn before_insert(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_insert(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_delete(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_delete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The error a `set_field` implementation returns for a field it lacks.
pub fn unknown_field(table: &str, field: &str) -> Error {
    Error::mapping(
        MappingErrorKind::UnknownField,
        Some(table),
        format!("bean has no field '{field}'"),
    )
}

/// The primary-key tuple of a bean read through its resolved table.
#[allow(clippy::result_large_err)]
pub fn primary_key_of<B: Bean>(table: &Table, bean: &B) -> Result<PrimaryKey> {
    if table.primary_key_count() == 0 {
        return Err(Error::mapping(
            MappingErrorKind::NoPrimaryKey,
            Some(table.name()),
            "table declares no primary key",
        ));
    }
    let values = bean.field_values()?;
    let key = table
        .primary_key_columns()
        .into_iter()
        .map(|col| {
            values
                .iter()
                .find(|(field, _)| *field == col.field_name)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null)
        })
        .collect();
    Ok(PrimaryKey(key))
}

/// An ordered primary-key tuple.
///
/// Equality and hashing go through the canonical string form, so keys built
/// from `Int` and `BigInt` values of the same number are the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKey(pub Vec<Value>);

impl PrimaryKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when any component is unset.
    pub fn has_zero(&self) -> bool {
        self.0.is_empty() || self.0.iter().any(Value::is_zero)
    }

    /// Canonical string form: a bare JSON scalar for simple keys, a JSON
    /// array for composite keys.
    pub fn key_string(&self) -> String {
        match self.0.as_slice() {
            [single] => single.canonical().to_string(),
            many => serde_json::Value::Array(many.iter().map(Value::canonical).collect())
                .to_string(),
        }
    }
}

impl PartialEq for PrimaryKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_string() == other.key_string()
    }
}

impl Eq for PrimaryKey {}

impl Hash for PrimaryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_string().hash(state);
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_string())
    }
}

impl From<Value> for PrimaryKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        Self(vec![Value::BigInt(value)])
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        Self(vec![Value::from(value)])
    }
}

impl From<i32> for PrimaryKey {
    fn from(value: i32) -> Self {
        Self(vec![Value::Int(value)])
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        Self(vec![Value::Text(value)])
    }
}

impl From<Vec<Value>> for PrimaryKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for PrimaryKey {
    fn from((a, b): (A, B)) -> Self {
        Self(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for PrimaryKey {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self(vec![a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn key_string_forms() {
        assert_eq!(PrimaryKey::from(7_i64).key_string(), "7");
        assert_eq!(PrimaryKey::from("abc").key_string(), "\"abc\"");
        let composite = PrimaryKey::new(vec![Value::from("acme"), Value::Int(3)]);
        assert_eq!(composite.key_string(), r#"["acme",3]"#);
    }

    #[test]
    fn keys_compare_across_integer_widths() {
        let mut map = HashMap::new();
        map.insert(PrimaryKey::from(Value::Int(5)), "five");
        assert_eq!(map.get(&PrimaryKey::from(5_i64)), Some(&"five"));
    }

    #[test]
    fn zero_components() {
        assert!(PrimaryKey::from(0_i64).has_zero());
        assert!(PrimaryKey::new(vec![]).has_zero());
        assert!(!PrimaryKey::from(1_i64).has_zero());
    }
}
