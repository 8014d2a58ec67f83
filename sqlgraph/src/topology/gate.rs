// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema-change gate
//!
//! At most one holder may change the structure of a topology at a time.
//! The gate is re-entrant for its holder; everybody else blocks until it is
//! released or the configured timeout runs out.

use super::error::{TopologyError, TopologyResult};
use crate::txn::TransactionId;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Who holds the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateHolder {
    Transaction(TransactionId),
    /// Replay of a notification or an import, not tied to a transaction
    Remote,
}

impl fmt::Display for GateHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateHolder::Transaction(id) => write!(f, "{}", id),
            GateHolder::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaChangeGate {
    holder: Mutex<Option<GateHolder>>,
    released: Condvar,
    changing: AtomicUsize,
}

impl SchemaChangeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the gate for `holder`.
    ///
    /// Returns `true` when the gate was newly taken and `false` when the
    /// holder already had it.
    pub fn acquire(&self, holder: GateHolder, timeout: Option<Duration>) -> TopologyResult<bool> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut current = self.holder.lock();
        loop {
            match *current {
                Some(existing) if existing == holder => return Ok(false),
                None => {
                    *current = Some(holder);
                    self.changing.fetch_add(1, Ordering::SeqCst);
                    log::debug!("Schema-change gate acquired by {}", holder);
                    return Ok(true);
                }
                Some(existing) => {
                    log::debug!("{} waiting for schema-change gate held by {}", holder, existing);
                    match deadline {
                        Some(deadline) => {
                            if self.released.wait_until(&mut current, deadline).timed_out()
                                && current.is_some()
                            {
                                return Err(TopologyError::SchemaChangeTimeout(
                                    timeout.unwrap_or_default(),
                                ));
                            }
                        }
                        None => self.released.wait(&mut current),
                    }
                }
            }
        }
    }

    /// Release the gate if `holder` has it
    pub fn release(&self, holder: GateHolder) -> bool {
        let mut current = self.holder.lock();
        if *current == Some(holder) {
            *current = None;
            self.changing.fetch_sub(1, Ordering::SeqCst);
            log::debug!("Schema-change gate released by {}", holder);
            drop(current);
            self.released.notify_all();
            true
        } else {
            false
        }
    }

    pub fn holder(&self) -> Option<GateHolder> {
        *self.holder.lock()
    }

    pub fn is_held_by(&self, holder: GateHolder) -> bool {
        self.holder() == Some(holder)
    }

    /// Whether any structural change is in flight
    pub fn is_changing(&self) -> bool {
        self.changing.load(Ordering::SeqCst) > 0
    }
}
