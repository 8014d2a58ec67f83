// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Durable log of structural changes
//!
//! Every committed structural change is written as one row of a log table
//! inside a bootstrap schema, in the same database transaction as its DDL.
//! On open a topology replays the log to rebuild its catalog; later it
//! polls the log for changes committed by other nodes.

use crate::notify::{Notification, NotificationCodec};
use crate::sql::{SqlConnection, SqlDialect, SqlValue};
use crate::topology::{TopologyError, TopologyResult};
use std::sync::Arc;

/// Schema holding the bootstrap tables
pub const META_SCHEMA: &str = "sqlgraph_schema";
/// Log table, one row per committed structural change
pub const LOG_TABLE: &str = "V_log";

/// A replayable row of the change log
#[derive(Debug, Clone, PartialEq)]
pub struct MetaLogEntry {
    pub id: i64,
    pub notification: Notification,
}

/// Persistence of committed structural changes
pub trait MetaStore: Send + Sync {
    /// Create the bootstrap schema and tables if they are missing
    fn bootstrap(&self, conn: &dyn SqlConnection) -> TopologyResult<()>;

    /// Append a committed change to the log
    ///
    /// # Arguments
    /// * `conn` - Connection of the committing transaction
    /// * `notification` - The change, as broadcast to other nodes
    ///
    /// # Returns
    /// * `Ok(id)` with the log id of the new row
    fn record(&self, conn: &dyn SqlConnection, notification: &Notification) -> TopologyResult<i64>;

    /// Log rows with an id above `after`, oldest first
    fn load_since(&self, conn: &dyn SqlConnection, after: i64) -> TopologyResult<Vec<MetaLogEntry>>;
}

/// [`MetaStore`] keeping the log in a table of the graph database itself
pub struct SqlMetaStore {
    dialect: Arc<dyn SqlDialect>,
}

impl SqlMetaStore {
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    fn log_table(&self) -> String {
        self.dialect.qualified_table(META_SCHEMA, LOG_TABLE)
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.maybe_wrap_in_quotes(identifier)
    }
}

impl MetaStore for SqlMetaStore {
    fn bootstrap(&self, conn: &dyn SqlConnection) -> TopologyResult<()> {
        if let Some(sql) = self.dialect.create_schema_statement(META_SCHEMA, true) {
            log::debug!("{}", sql);
            conn.execute(&sql, &[])?;
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} {}, {} TEXT NOT NULL, {} TEXT NOT NULL, {} TEXT NOT NULL)",
            self.log_table(),
            self.quote("ID"),
            self.dialect.auto_increment_primary_key_construct(),
            self.quote("timestamp"),
            self.quote("node"),
            self.quote("log")
        );
        log::debug!("{}", sql);
        conn.execute(&sql, &[])?;
        Ok(())
    }

    fn record(&self, conn: &dyn SqlConnection, notification: &Notification) -> TopologyResult<i64> {
        let sql = format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
            self.log_table(),
            self.quote("timestamp"),
            self.quote("node"),
            self.quote("log"),
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
            self.dialect.placeholder(3)
        );
        log::debug!("{}", sql);
        conn.execute(
            &sql,
            &[
                SqlValue::from(notification.timestamp.to_rfc3339()),
                SqlValue::from(notification.origin.to_string()),
                SqlValue::from(NotificationCodec::encode(notification)?),
            ],
        )?;
        Ok(conn.last_insert_id()?)
    }

    fn load_since(&self, conn: &dyn SqlConnection, after: i64) -> TopologyResult<Vec<MetaLogEntry>> {
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} > {} ORDER BY {}",
            self.quote("ID"),
            self.quote("log"),
            self.log_table(),
            self.quote("ID"),
            self.dialect.placeholder(1),
            self.quote("ID")
        );
        let rows = conn.query(&sql, &[SqlValue::from(after)])?;
        rows.into_iter()
            .map(|row| {
                let id = row.first().and_then(SqlValue::as_i64);
                let payload = row.get(1).and_then(SqlValue::as_str);
                match (id, payload) {
                    (Some(id), Some(payload)) => Ok(MetaLogEntry {
                        id,
                        notification: NotificationCodec::decode(payload)?,
                    }),
                    _ => Err(TopologyError::Codec(format!("malformed row in {}", LOG_TABLE))),
                }
            })
            .collect()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::sql::sqlite::{SqliteConnection, SqliteDialect};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_record_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let conn = SqliteConnection::open(dir.path().join("meta.db")).unwrap();
        let store = SqlMetaStore::new(Arc::new(SqliteDialect::new()));
        store.bootstrap(&conn).unwrap();
        store.bootstrap(&conn).unwrap();

        let notification = Notification {
            version: NotificationCodec::CURRENT_VERSION,
            origin: Uuid::new_v4(),
            timestamp: Utc::now(),
            schemas: Vec::new(),
        };
        let first = store.record(&conn, &notification).unwrap();
        let second = store.record(&conn, &notification).unwrap();
        assert!(second > first);

        let entries = store.load_since(&conn, 0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].notification, notification);
        assert_eq!(store.load_since(&conn, first).unwrap().len(), 1);
    }
}
