// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Topology configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the schema every topology starts with
pub const DEFAULT_SCHEMA: &str = "public";

/// Configuration for a [`crate::Topology`] instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Schema that always exists and cannot be removed
    pub default_schema: String,

    /// Maximum time to wait for the schema-change gate, `None` waits forever
    pub schema_change_timeout_ms: Option<u64>,

    /// Whether committed deltas are handed to the notification publisher
    pub publish_notifications: bool,

    /// Whether notifications carrying this node's origin are skipped
    pub ignore_own_notifications: bool,

    /// Whether drift validation runs right after the catalog is loaded
    pub validate_on_open: bool,

    /// Longest accepted table or column name
    pub max_identifier_length: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            default_schema: DEFAULT_SCHEMA.to_string(),
            schema_change_timeout_ms: None,
            publish_notifications: true,
            ignore_own_notifications: true,
            validate_on_open: false,
            max_identifier_length: 63,
        }
    }
}

impl TopologyConfig {
    /// Configuration that validates on open and bounds the gate wait
    pub fn strict() -> Self {
        Self {
            schema_change_timeout_ms: Some(30_000),
            validate_on_open: true,
            ..Self::default()
        }
    }

    /// Configuration for a read replica that never publishes
    pub fn replica() -> Self {
        Self {
            publish_notifications: false,
            ..Self::default()
        }
    }

    /// Set the gate timeout
    pub fn with_schema_change_timeout(mut self, timeout: Duration) -> Self {
        self.schema_change_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Gate timeout as a [`Duration`]
    pub fn schema_change_timeout(&self) -> Option<Duration> {
        self.schema_change_timeout_ms.map(Duration::from_millis)
    }
}
