// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transactions over a topology
//!
//! A [`Transaction`] wraps one database transaction. Reads see the
//! committed catalog until the transaction makes its first structural
//! change; from then on it holds the schema-change gate and works on a
//! private copy that becomes visible to others only at commit.

pub mod state;
pub mod transaction;

pub use state::{TransactionId, TransactionState, TransactionStatus};
pub use transaction::Transaction;
