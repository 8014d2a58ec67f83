// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Notification publishing
//!
//! A topology hands each committed delta to its [`NotificationPublisher`].
//! [`MemoryBus`] is an in-process log of encoded notifications with
//! sequence numbers; replicas follow it through a [`BusSubscription`].

use super::codec::NotificationCodec;
use super::message::Notification;
use crate::topology::{Topology, TopologyError, TopologyResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Receives every committed structural delta
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: &Notification) -> TopologyResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEntry {
    pub sequence: u64,
    pub payload: String,
}

#[derive(Debug, Default)]
struct BusLog {
    entries: VecDeque<BusEntry>,
    /// Sequence number of the last entry ever published
    last_sequence: u64,
}

/// Log of published notifications. Entries stay until they are truncated;
/// sequence numbers are never reused.
#[derive(Debug, Default)]
pub struct MemoryBus {
    log: Mutex<BusLog>,
}

impl MemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Entries with a sequence number above `sequence`
    pub fn entries_since(&self, sequence: u64) -> Vec<BusEntry> {
        self.log
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.sequence > sequence)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().entries.is_empty()
    }

    /// Sequence number of the oldest entry still held
    pub fn first_sequence(&self) -> Option<u64> {
        self.log.lock().entries.front().map(|entry| entry.sequence)
    }

    /// Drop the entries below `sequence`, returning how many were dropped.
    /// Subscriptions behind that point skip the dropped entries.
    pub fn truncate_before(&self, sequence: u64) -> usize {
        let mut state = self.log.lock();
        let before = state.entries.len();
        while state.entries.front().is_some_and(|entry| entry.sequence < sequence) {
            state.entries.pop_front();
        }
        let dropped = before - state.entries.len();
        drop(state);
        if dropped > 0 {
            log::debug!("Truncated {} notification(s) before {}", dropped, sequence);
        }
        dropped
    }

    /// Follow the bus from its beginning
    pub fn subscribe(self: &Arc<Self>) -> BusSubscription {
        BusSubscription {
            bus: Arc::clone(self),
            cursor: 0,
        }
    }
}

impl NotificationPublisher for MemoryBus {
    fn publish(&self, notification: &Notification) -> TopologyResult<()> {
        let payload = NotificationCodec::encode(notification)?;
        let mut state = self.log.lock();
        state.last_sequence += 1;
        let sequence = state.last_sequence;
        log::debug!("Published notification {} from {}", sequence, notification.origin);
        state.entries.push_back(BusEntry { sequence, payload });
        Ok(())
    }
}

/// Read position in a [`MemoryBus`]
pub struct BusSubscription {
    bus: Arc<MemoryBus>,
    cursor: u64,
}

impl BusSubscription {
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Entries after the cursor, warning when truncation dropped some of them
    fn pending(&self) -> Vec<BusEntry> {
        let entries = self.bus.entries_since(self.cursor);
        if let Some(first) = entries.first() {
            if first.sequence > self.cursor + 1 {
                log::warn!(
                    "Notifications {} to {} were truncated before this subscription read them",
                    self.cursor + 1,
                    first.sequence - 1
                );
            }
        }
        entries
    }

    /// Decode the entries published since the last poll
    pub fn poll(&mut self) -> TopologyResult<Vec<Notification>> {
        let entries = self.pending();
        let mut notifications = Vec::with_capacity(entries.len());
        for entry in entries {
            notifications.push(NotificationCodec::decode(&entry.payload)?);
            self.cursor = entry.sequence;
        }
        Ok(notifications)
    }

    /// Apply every new entry to `topology`, returning how many catalog
    /// changes that produced
    pub fn drain_into(&mut self, topology: &Topology) -> TopologyResult<usize> {
        let mut applied = 0;
        for entry in self.pending() {
            let notification = NotificationCodec::decode(&entry.payload)?;
            match topology.apply_remote_notification(&notification) {
                Ok(count) => applied += count,
                Err(TopologyError::ListenerFailed(errors)) => {
                    log::warn!(
                        "{} listener(s) failed on notification {}",
                        errors.len(),
                        entry.sequence
                    );
                }
                Err(err) => return Err(err),
            }
            self.cursor = entry.sequence;
        }
        Ok(applied)
    }

    /// Start over from the first entry
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn notification() -> Notification {
        Notification {
            version: NotificationCodec::CURRENT_VERSION,
            origin: Uuid::new_v4(),
            timestamp: Utc::now(),
            schemas: Vec::new(),
        }
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let bus = MemoryBus::new();
        bus.publish(&notification()).unwrap();
        bus.publish(&notification()).unwrap();
        let entries = bus.entries_since(0);
        assert_eq!(entries.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(bus.entries_since(1).len(), 1);
    }

    #[test]
    fn test_poll_advances_cursor() {
        let bus = MemoryBus::new();
        let mut subscription = bus.subscribe();
        bus.publish(&notification()).unwrap();
        assert_eq!(subscription.poll().unwrap().len(), 1);
        assert!(subscription.poll().unwrap().is_empty());
        assert_eq!(subscription.cursor(), 1);
        subscription.rewind();
        assert_eq!(subscription.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_truncate_before_keeps_sequence_numbers() {
        let bus = MemoryBus::new();
        let mut subscription = bus.subscribe();
        for _ in 0..3 {
            bus.publish(&notification()).unwrap();
        }
        assert_eq!(subscription.poll().unwrap().len(), 3);

        assert_eq!(bus.truncate_before(3), 2);
        assert_eq!(bus.truncate_before(3), 0);
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.first_sequence(), Some(3));

        assert_eq!(bus.truncate_before(10), 1);
        assert!(bus.is_empty());
        bus.publish(&notification()).unwrap();
        assert_eq!(bus.first_sequence(), Some(4));
        assert_eq!(subscription.poll().unwrap().len(), 1);
        assert_eq!(subscription.cursor(), 4);

        let mut late = bus.subscribe();
        assert_eq!(late.poll().unwrap().len(), 1);
        assert_eq!(late.cursor(), 4);
    }
}
