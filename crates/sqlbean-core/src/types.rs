//! Abstract SQL column types.
//!
//! These are dialect-neutral descriptors; the dialect layer turns them into
//! literal type names.

/// SQL data types a column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    // Integer types
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision (precision and scale come from the column lengths)
    Decimal,

    // Boolean
    Boolean,

    // String types (length from the column)
    Char,
    VarChar,
    Text,

    // Binary types
    Binary,
    VarBinary,
    Blob,

    // Date/time types
    Date,
    Time,
    DateTime,
    Timestamp,

    // JSON
    Json,
}

impl SqlType {
    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(
            self,
            SqlType::Char | SqlType::VarChar | SqlType::Text | SqlType::Json
        )
    }

    /// Check if this type stores raw bytes.
    pub const fn is_binary(&self) -> bool {
        matches!(self, SqlType::Binary | SqlType::VarBinary | SqlType::Blob)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp
        )
    }
}
