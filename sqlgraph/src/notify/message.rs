// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Wire messages of structural change notifications
//!
//! One [`Notification`] carries the delta of one commit. Every entity kind
//! has its own message type; fields without pending changes are left out of
//! the JSON.

use crate::topology::edge_role::{Direction, EdgeRemoveType};
use crate::topology::label::{Index, Partition, PartitionType};
use crate::topology::multiplicity::Multiplicity;
use crate::topology::property::PropertyType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn is_false(value: &bool) -> bool {
    !*value
}

/// The delta of one committed schema-changing transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub version: u32,
    /// Node that committed the change
    pub origin: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<SchemaMessage>,
}

impl Notification {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMessage {
    pub schema: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub created: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vertex_labels: Vec<LabelMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edge_labels: Vec<LabelMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_vertex_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_edge_labels: Vec<String>,
}

/// Pending changes of one vertex or edge label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelMessage {
    pub label: String,
    /// Set when the label is new
    #[serde(default, skip_serializing_if = "is_false")]
    pub created: bool,
    /// Previous name of a renamed label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "PartitionType::is_none")]
    pub partition_type: PartitionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_properties: Vec<PropertyColumnMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_updated_properties: Vec<PropertyColumnMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_removed_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_renamed_properties: Vec<RenamedPropertyMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_removed_indexes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_partitions: Vec<Partition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_removed_partitions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_out_edge_labels: Vec<EdgeRoleMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_removed_out_edge_labels: Vec<RemovedEdgeRoleMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_in_edge_labels: Vec<EdgeRoleMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncommitted_removed_in_edge_labels: Vec<RemovedEdgeRoleMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyColumnMessage {
    pub name: String,
    pub property_type: PropertyType,
    pub multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_literal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedPropertyMessage {
    pub from: String,
    pub to: String,
}

/// Edge label as referenced from an edge role. Partitioning is carried
/// when the edge label is created by the same commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLabelRef {
    pub schema: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "PartitionType::is_none")]
    pub partition_type: PartitionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_expression: Option<String>,
}

/// A role the enclosing vertex label gained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRoleMessage {
    pub direction: Direction,
    pub multiplicity: Multiplicity,
    pub edge_label: EdgeLabelRef,
}

/// A role the enclosing vertex label lost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedEdgeRoleMessage {
    pub schema: String,
    pub label: String,
    #[serde(rename = "type")]
    pub remove_type: EdgeRemoveType,
}
