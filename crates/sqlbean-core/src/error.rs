//! Error types for sqlbean operations.
//!
//! Errors fall into four families:
//!
//! - **mapping** errors ([`MappingError`]) are raised while rendering, before
//!   any SQL reaches a connection;
//! - **execution** errors ([`ConnectionError`], [`QueryError`], [`TypeError`])
//!   come from the driver and are surfaced unchanged;
//! - **consistency** errors ([`ConsistencyError`]) report results the caller
//!   asked to be told about, such as several rows for a single-row read;
//! - **resource** errors ([`ResourceError`]) report misuse of a session's
//!   lifecycle.

use std::fmt;

/// The primary error type for all sqlbean operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, disconnect)
    Connection(ConnectionError),
    /// Query execution errors reported by the driver
    Query(QueryError),
    /// Value decoding errors
    Type(TypeError),
    /// Statement could not be rendered against the table metadata
    Mapping(MappingError),
    /// The database answered in a way the operation does not accept
    Consistency(ConsistencyError),
    /// Session lifecycle misuse
    Resource(ResourceError),
    /// Pool errors
    Pool(PoolError),
    /// Cache store errors
    Cache(CacheError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(std::io::Error),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost during operation
    Disconnected,
    /// Connection was already closed
    Closed,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Database is busy or locked
    Busy,
    /// Parameter binding failed
    Bind,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct MappingError {
    pub kind: MappingErrorKind,
    pub table: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingErrorKind {
    /// A column name does not exist in the table
    UnknownColumn,
    /// A bean field has no matching column descriptor
    UnknownField,
    /// Identifier tuple length differs from the primary-key arity
    PrimaryKeyArity,
    /// The operation needs a primary key the table does not declare
    NoPrimaryKey,
    /// A slice or map field could not be serialized
    Serialize,
    /// A destructive statement was rendered without any condition
    MissingCondition,
}

#[derive(Debug)]
pub struct ConsistencyError {
    pub kind: ConsistencyErrorKind,
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyErrorKind {
    /// A single-row read matched more than one row
    MultipleRows,
    /// A generated key could not be read back after insert
    MissingGeneratedKey,
}

#[derive(Debug)]
pub struct ResourceError {
    pub kind: ResourceErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    /// The session was already closed
    SessionClosed,
    /// `begin` was called while a transaction is open
    AlreadyInTransaction,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// Pool exhausted (no available connections)
    Exhausted,
    /// Pool is closed
    Closed,
    /// The connection factory failed
    Connect,
}

#[derive(Debug)]
pub struct CacheError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Shorthand for a mapping error.
    pub fn mapping(
        kind: MappingErrorKind,
        table: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Mapping(MappingError {
            kind,
            table: table.map(str::to_string),
            message: message.into(),
        })
    }

    /// Shorthand for a resource error.
    pub fn resource(kind: ResourceErrorKind, message: impl Into<String>) -> Self {
        Error::Resource(ResourceError {
            kind,
            message: message.into(),
        })
    }

    /// Was this raised before any SQL was sent?
    pub fn is_mapping(&self) -> bool {
        matches!(self, Error::Mapping(_))
    }

    /// The mapping error kind, if this is a mapping error.
    pub fn mapping_kind(&self) -> Option<MappingErrorKind> {
        match self {
            Error::Mapping(m) => Some(m.kind),
            _ => None,
        }
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(c) => matches!(
                c.kind,
                ConnectionErrorKind::Connect | ConnectionErrorKind::Disconnected
            ),
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Mapping(e) => write!(f, "Mapping error: {}", e),
            Error::Consistency(e) => write!(f, "Consistency error: {}", e),
            Error::Resource(e) => write!(f, "Resource error: {}", e.message),
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::Cache(e) => write!(f, "Cache error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let boxed = match self {
            Error::Connection(e) => e.source.as_deref(),
            Error::Query(e) => e.source.as_deref(),
            Error::Pool(e) => e.source.as_deref(),
            Error::Cache(e) => e.source.as_deref(),
            Error::Config(e) => e.source.as_deref(),
            Error::Io(e) => return Some(e),
            _ => None,
        };
        boxed.map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} (table '{}')", self.message, table),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (table '{}')", self.message, self.table)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<ConsistencyError> for Error {
    fn from(err: ConsistencyError) -> Self {
        Error::Consistency(err)
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        Error::Cache(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for sqlbean operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_helpers() {
        let err = Error::mapping(
            MappingErrorKind::PrimaryKeyArity,
            Some("accounts"),
            "expected 2 primary-key values, got 1",
        );
        assert!(err.is_mapping());
        assert_eq!(err.mapping_kind(), Some(MappingErrorKind::PrimaryKeyArity));
        assert_eq!(
            err.to_string(),
            "Mapping error: expected 2 primary-key values, got 1 (table 'accounts')"
        );
    }

    #[test]
    fn query_error_exposes_sql() {
        let err = Error::Query(QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO t (a) VALUES (?)".to_string()),
            message: "UNIQUE constraint failed: t.a".to_string(),
            source: None,
        });
        assert_eq!(err.sql(), Some("INSERT INTO t (a) VALUES (?)"));
        assert!(!err.is_mapping());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn connection_flags() {
        let lost = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "lost connection".to_string(),
            source: None,
        });
        assert!(lost.is_connection_error());

        let closed = Error::resource(ResourceErrorKind::SessionClosed, "session closed");
        assert!(!closed.is_connection_error());
        assert_eq!(closed.to_string(), "Resource error: session closed");
    }

    #[test]
    fn io_source_is_preserved() {
        let err = Error::from(std::io::Error::other("disk gone"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
