//! Core types and traits for sqlbean.
//!
//! This crate provides the foundations the statement builder and the session
//! are written against:
//!
//! - [`Value`] and [`Row`] for data moving to and from drivers
//! - [`Bean`], [`Column`] and [`Table`] for record metadata
//! - [`Connection`] for drivers
//! - [`Error`] for every failure the stack reports
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod bean;
pub mod connection;
pub mod error;
pub mod mapper;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use bean::{Bean, PrimaryKey, primary_key_of, unknown_field};
pub use connection::Connection;
pub use error::{Error, MappingErrorKind, Result};
pub use mapper::{NameMapper, PrefixMapper, SameMapper, SnakeMapper};
pub use row::{FromValue, Row};
pub use schema::{Column, MapType, Table, TableRegistry};
pub use types::SqlType;
pub use value::Value;
