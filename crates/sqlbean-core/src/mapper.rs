//! Name mappers.
//!
//! A mapper turns a Rust-side name (a field or a type) into the name used in
//! SQL. The engine holds one mapper for columns and one for tables and
//! applies them once, when a bean's [`Table`](crate::Table) is resolved.

use std::fmt::Debug;
use std::sync::Arc;

/// Converts Rust-side names into SQL names.
pub trait NameMapper: Send + Sync + Debug {
    fn obj_to_table(&self, name: &str) -> String;
}

/// Keeps names unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameMapper;

impl NameMapper for SameMapper {
    fn obj_to_table(&self, name: &str) -> String {
        name.to_string()
    }
}

/// `UserName` and `userName` become `user_name`.
///
/// Runs of capitals are kept together, so `HTTPStatus` becomes
/// `http_status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeMapper;

impl NameMapper for SnakeMapper {
    fn obj_to_table(&self, name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() {
                let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_numeric());
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                let prev_upper = i > 0 && chars[i - 1].is_uppercase();
                if i > 0 && chars[i - 1] != '_' && (prev_lower || (prev_upper && next_lower)) {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Prepends a fixed prefix to whatever the inner mapper produces.
#[derive(Debug, Clone)]
pub struct PrefixMapper {
    prefix: String,
    inner: Arc<dyn NameMapper>,
}

impl PrefixMapper {
    pub fn new(prefix: impl Into<String>, inner: Arc<dyn NameMapper>) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl NameMapper for PrefixMapper {
    fn obj_to_table(&self, name: &str) -> String {
        format!("{}{}", self.prefix, self.inner.obj_to_table(name))
    }
}
