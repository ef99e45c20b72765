//! JOIN clause types.

use sqlbean_core::Value;

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }

    /// Parse the operator strings callers usually pass (`"LEFT"`, `"inner"`).
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_uppercase().as_str() {
            "" | "INNER" => Some(JoinType::Inner),
            "LEFT" | "LEFT OUTER" => Some(JoinType::Left),
            "RIGHT" | "RIGHT OUTER" => Some(JoinType::Right),
            "FULL" | "FULL OUTER" => Some(JoinType::Full),
            "CROSS" => Some(JoinType::Cross),
            _ => None,
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone)]
pub struct Join {
    pub join_type: JoinType,
    /// Joined table name, quoted at render time
    pub table: String,
    pub alias: Option<String>,
    /// Raw ON condition with `?` placeholders
    pub on: String,
    pub args: Vec<Value>,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            alias: None,
            on: on.into(),
            args: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Render with `quote` applied to the table and alias.
    pub fn to_sql(&self, quote: impl Fn(&str) -> String) -> String {
        let mut sql = format!("{} {}", self.join_type.as_str(), quote(&self.table));
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&quote(alias));
        }
        if self.join_type != JoinType::Cross && !self.on.is_empty() {
            sql.push_str(" ON ");
            sql.push_str(&self.on);
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_alias() {
        let join = Join::new(JoinType::Left, "orders", "o.user_id = users.id").alias("o");
        assert_eq!(
            join.to_sql(|s| format!("\"{s}\"")),
            "LEFT JOIN \"orders\" AS \"o\" ON o.user_id = users.id"
        );
        assert_eq!(JoinType::parse("left outer"), Some(JoinType::Left));
        assert_eq!(JoinType::parse("sideways"), None);
    }
}
