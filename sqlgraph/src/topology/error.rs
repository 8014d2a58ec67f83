// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the topology engine

use super::listener::ListenerError;
use super::property::PropertyType;
use crate::sql::SqlError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TopologyError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Timed out after {0:?} waiting for the schema-change gate")]
    SchemaChangeTimeout(Duration),

    #[error("Transaction is no longer active: {0}")]
    TransactionClosed(String),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Label not found: {0}")]
    LabelNotFound(String),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Edge role not found: {0}")]
    EdgeRoleNotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Property type conflict on {name}: existing {existing}, requested {requested}")]
    PropertyTypeConflict {
        name: String,
        existing: PropertyType,
        requested: PropertyType,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid column name: {0}")]
    InvalidColumnName(String),

    #[error("Read only: {0}")]
    ReadOnly(String),

    #[error("Identifier property cannot be changed: {0}")]
    IdentifierImmutable(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("SQL error: {0}")]
    Sql(#[from] SqlError),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Notification failed: {0}")]
    NotificationFailed(String),

    #[error("{} topology listener(s) failed", .0.len())]
    ListenerFailed(Vec<ListenerError>),
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::Codec(err.to_string())
    }
}

pub type TopologyResult<T> = Result<T, TopologyError>;
