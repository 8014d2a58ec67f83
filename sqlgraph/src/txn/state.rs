// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction state management
//!
//! This module defines the transaction state and lifecycle management.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Unique identifier for a transaction within one topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Get the underlying ID value
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Create TransactionId from u64
    pub fn from_u64(id: u64) -> Self {
        TransactionId(id)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is active and can perform operations
    Active,
    /// Transaction has been committed successfully
    Committed,
    /// Transaction has been rolled back
    RolledBack,
    /// Transaction is in an error state
    Failed(String),
}

/// Lifecycle bookkeeping of one transaction
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub start_time: SystemTime,
    pub end_time: Option<SystemTime>,
    /// Structural operations performed, in order
    pub operations: Vec<String>,
}

impl TransactionState {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            status: TransactionStatus::Active,
            start_time: SystemTime::now(),
            end_time: None,
            operations: Vec::new(),
        }
    }

    /// Record a structural operation
    pub fn add_operation(&mut self, description: impl Into<String>) {
        self.operations.push(description.into());
    }

    /// Mark transaction as committed
    pub fn commit(&mut self) {
        self.status = TransactionStatus::Committed;
        self.end_time = Some(SystemTime::now());
    }

    /// Mark transaction as rolled back
    pub fn rollback(&mut self) {
        self.status = TransactionStatus::RolledBack;
        self.end_time = Some(SystemTime::now());
    }

    /// Mark transaction as failed with error message
    pub fn fail(&mut self, error: String) {
        self.status = TransactionStatus::Failed(error);
        self.end_time = Some(SystemTime::now());
    }

    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub fn duration(&self) -> Duration {
        let end_time = self.end_time.unwrap_or_else(SystemTime::now);
        end_time.duration_since(self.start_time).unwrap_or_default()
    }
}
