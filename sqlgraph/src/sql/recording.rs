// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement-recording connections
//!
//! A recording connection executes nothing. It keeps every statement it is
//! given so callers can inspect the SQL the topology produced, and answers
//! every query with no rows. Replicas that only replay notifications and
//! tests that exercise the engine without a database use it.

use super::{ConnectionFactory, SqlConnection, SqlError, SqlResult, SqlValue};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Journal {
    statements: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    last_id: AtomicI64,
}

pub struct RecordingConnection {
    journal: Arc<Journal>,
}

impl SqlConnection for RecordingConnection {
    fn execute(&self, sql: &str, _params: &[SqlValue]) -> SqlResult<usize> {
        if let Some(pattern) = self
            .journal
            .failures
            .lock()
            .iter()
            .find(|pattern| sql.contains(pattern.as_str()))
        {
            return Err(SqlError::Execution(format!(
                "statement matching '{}' failed",
                pattern
            )));
        }
        self.journal.statements.lock().push(sql.to_string());
        if sql.starts_with("INSERT") {
            self.journal.last_id.fetch_add(1, Ordering::SeqCst);
            return Ok(1);
        }
        Ok(0)
    }

    fn query(&self, sql: &str, _params: &[SqlValue]) -> SqlResult<Vec<Vec<SqlValue>>> {
        self.journal.statements.lock().push(sql.to_string());
        Ok(Vec::new())
    }

    fn last_insert_id(&self) -> SqlResult<i64> {
        Ok(self.journal.last_id.load(Ordering::SeqCst))
    }
}

/// Hands out recording connections sharing one statement journal
#[derive(Clone, Default)]
pub struct RecordingConnectionFactory {
    journal: Arc<Journal>,
}

impl RecordingConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every statement executed so far, across all connections
    pub fn statements(&self) -> Vec<String> {
        self.journal.statements.lock().clone()
    }

    pub fn clear(&self) {
        self.journal.statements.lock().clear();
    }

    /// Make every later statement containing `pattern` fail
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.journal.failures.lock().push(pattern.into());
    }
}

impl ConnectionFactory for RecordingConnectionFactory {
    fn connect(&self) -> SqlResult<Box<dyn SqlConnection>> {
        Ok(Box::new(RecordingConnection {
            journal: Arc::clone(&self.journal),
        }))
    }
}
