// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQL collaborators
//!
//! The topology engine never talks to a database directly. It issues
//! statements through a [`SqlConnection`] obtained from a
//! [`ConnectionFactory`], and every piece of SQL text comes from a
//! [`SqlDialect`].

pub mod dialect;
pub mod postgres;
pub mod recording;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dialect::{ColumnMetadata, SqlDialect};
pub use postgres::PostgresDialect;
pub use recording::{RecordingConnection, RecordingConnectionFactory};

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Execution error: {0}")]
    Execution(String),

    /// NOT NULL, CHECK, UNIQUE or FOREIGN KEY failure on data modification
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl SqlError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, SqlError::ConstraintViolation(_))
    }
}

pub type SqlResult<T> = Result<T, SqlError>;

/// A single SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(value) => Some(*value),
            SqlValue::Boolean(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Boolean(value) => write!(f, "{}", value),
            SqlValue::Integer(value) => write!(f, "{}", value),
            SqlValue::Real(value) => write!(f, "{}", value),
            SqlValue::Text(value) => write!(f, "{}", value),
            SqlValue::Blob(value) => write!(f, "<{} bytes>", value.len()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A database connection owned by one transaction
pub trait SqlConnection: Send {
    /// Run a statement, returning the number of affected rows
    fn execute(&self, sql: &str, params: &[SqlValue]) -> SqlResult<usize>;

    /// Run a query, returning all rows
    fn query(&self, sql: &str, params: &[SqlValue]) -> SqlResult<Vec<Vec<SqlValue>>>;

    /// Row id generated by the last insert
    fn last_insert_id(&self) -> SqlResult<i64>;

    fn begin(&self) -> SqlResult<()> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&self) -> SqlResult<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&self) -> SqlResult<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

/// Source of connections for a topology
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> SqlResult<Box<dyn SqlConnection>>;
}
