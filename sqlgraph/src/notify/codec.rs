// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned notification codec
//!
//! Converts between the in-memory [`ChangeSet`] of a commit and its wire
//! [`Notification`], and between notifications and JSON text.

use super::message::{
    EdgeLabelRef, EdgeRoleMessage, LabelMessage, Notification, PropertyColumnMessage,
    RemovedEdgeRoleMessage, RenamedPropertyMessage, SchemaMessage,
};
use crate::topology::change_set::{ChangeSet, LabelDelta, LabelHeader, SchemaDelta};
use crate::topology::edge_role::{Direction, EdgeRole};
use crate::topology::error::{TopologyError, TopologyResult};
use crate::topology::label::{LabelId, LabelKind};
use crate::topology::property::{PropertyColumn, PropertyDefinition};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct NotificationCodec;

impl NotificationCodec {
    /// Newest message layout this build reads and writes
    pub const CURRENT_VERSION: u32 = 1;

    pub fn encode(notification: &Notification) -> TopologyResult<String> {
        Ok(serde_json::to_string(notification)?)
    }

    pub fn decode(payload: &str) -> TopologyResult<Notification> {
        let notification: Notification = serde_json::from_str(payload)?;
        if notification.version > Self::CURRENT_VERSION {
            return Err(TopologyError::Codec(format!(
                "notification version {} is newer than {}",
                notification.version,
                Self::CURRENT_VERSION
            )));
        }
        Ok(notification)
    }

    /// Wire form of a commit's delta
    pub fn from_change_set(origin: Uuid, changes: &ChangeSet) -> Notification {
        let schemas = changes
            .schemas
            .iter()
            .filter(|(_, delta)| !delta.is_empty())
            .map(|(name, delta)| schema_message(changes, name, delta))
            .collect();
        Notification {
            version: Self::CURRENT_VERSION,
            origin,
            timestamp: Utc::now(),
            schemas,
        }
    }

    /// Delta described by a notification
    pub fn to_change_set(notification: &Notification) -> TopologyResult<ChangeSet> {
        let mut changes = ChangeSet::default();
        for message in &notification.schemas {
            let mut delta = SchemaDelta {
                created: message.created,
                removed: message.removed,
                removed_vertex_labels: message.removed_vertex_labels.iter().cloned().collect(),
                removed_edge_labels: message.removed_edge_labels.iter().cloned().collect(),
                ..Default::default()
            };
            for (kind, labels) in [
                (LabelKind::Vertex, &message.vertex_labels),
                (LabelKind::Edge, &message.edge_labels),
            ] {
                for label in labels {
                    let id = LabelId::new(message.schema.clone(), label.label.clone());
                    if let Some(origin) = &label.renamed_from {
                        let renamed = match kind {
                            LabelKind::Vertex => &mut delta.renamed_vertex_labels,
                            LabelKind::Edge => &mut delta.renamed_edge_labels,
                        };
                        renamed.insert(label.label.clone(), origin.clone());
                    }
                    let label_delta = label_delta(kind, &id, label)?;
                    let labels = match kind {
                        LabelKind::Vertex => &mut delta.vertex_labels,
                        LabelKind::Edge => &mut delta.edge_labels,
                    };
                    labels.insert(label.label.clone(), label_delta);
                }
            }
            changes.schemas.insert(message.schema.clone(), delta);
        }
        apply_role_partitioning(notification, &mut changes)?;
        Ok(changes)
    }
}

fn schema_message(changes: &ChangeSet, name: &str, delta: &SchemaDelta) -> SchemaMessage {
    let labels = |kind: LabelKind| -> Vec<LabelMessage> {
        delta
            .labels(kind)
            .iter()
            .map(|(label, label_delta)| {
                let mut message = label_message(changes, label, label_delta);
                message.renamed_from = delta.renamed_labels(kind).get(label).cloned();
                message
            })
            .collect()
    };
    SchemaMessage {
        schema: name.to_string(),
        created: delta.created,
        removed: delta.removed,
        vertex_labels: labels(LabelKind::Vertex),
        edge_labels: labels(LabelKind::Edge),
        removed_vertex_labels: delta.removed_vertex_labels.iter().cloned().collect(),
        removed_edge_labels: delta.removed_edge_labels.iter().cloned().collect(),
    }
}

fn column_message(column: &PropertyColumn) -> PropertyColumnMessage {
    let definition = column.definition();
    PropertyColumnMessage {
        name: column.name().to_string(),
        property_type: definition.property_type,
        multiplicity: definition.multiplicity,
        default_literal: definition.default_literal.clone(),
        check_constraint: definition.check_constraint.clone(),
    }
}

fn label_message(changes: &ChangeSet, label: &str, delta: &LabelDelta) -> LabelMessage {
    let mut message = LabelMessage {
        label: label.to_string(),
        uncommitted_properties: delta.properties.values().map(column_message).collect(),
        uncommitted_updated_properties: delta
            .updated_properties
            .values()
            .map(column_message)
            .collect(),
        uncommitted_removed_properties: delta.removed_properties.iter().cloned().collect(),
        uncommitted_renamed_properties: delta
            .renamed_properties
            .iter()
            .map(|(to, from)| RenamedPropertyMessage {
                from: from.clone(),
                to: to.clone(),
            })
            .collect(),
        uncommitted_indexes: delta.indexes.values().cloned().collect(),
        uncommitted_removed_indexes: delta.removed_indexes.iter().cloned().collect(),
        uncommitted_partitions: delta.partitions.values().cloned().collect(),
        uncommitted_removed_partitions: delta.removed_partitions.iter().cloned().collect(),
        ..Default::default()
    };
    if let Some(header) = &delta.created {
        message.created = true;
        message.identifiers = header.identifiers.clone();
        message.partition_type = header.partition_type;
        message.partition_expression = header.partition_expression.clone();
    }

    let roles = |direction: Direction| -> Vec<EdgeRoleMessage> {
        delta
            .edge_roles(direction)
            .values()
            .map(|role| {
                let edge = role.edge_label();
                let header = created_header(changes, edge);
                EdgeRoleMessage {
                    direction,
                    multiplicity: role.multiplicity(),
                    edge_label: EdgeLabelRef {
                        schema: edge.schema.clone(),
                        label: edge.label.clone(),
                        partition_type: header.map(|h| h.partition_type).unwrap_or_default(),
                        partition_expression: header.and_then(|h| h.partition_expression.clone()),
                    },
                }
            })
            .collect()
    };
    let removed = |direction: Direction| -> Vec<RemovedEdgeRoleMessage> {
        delta
            .removed_edge_roles(direction)
            .iter()
            .map(|(edge, remove_type)| RemovedEdgeRoleMessage {
                schema: edge.schema.clone(),
                label: edge.label.clone(),
                remove_type: *remove_type,
            })
            .collect()
    };
    message.uncommitted_out_edge_labels = roles(Direction::Out);
    message.uncommitted_removed_out_edge_labels = removed(Direction::Out);
    message.uncommitted_in_edge_labels = roles(Direction::In);
    message.uncommitted_removed_in_edge_labels = removed(Direction::In);
    message
}

/// Header of an edge label created by the same change set
fn created_header<'a>(changes: &'a ChangeSet, edge: &LabelId) -> Option<&'a LabelHeader> {
    changes
        .schemas
        .get(&edge.schema)?
        .edge_labels
        .get(&edge.label)?
        .created
        .as_ref()
}

/// Fill in the partitioning of created edge labels from the roles that
/// reference them. Conflicting partitioning is an error.
fn apply_role_partitioning(notification: &Notification, changes: &mut ChangeSet) -> TopologyResult<()> {
    let refs = notification
        .schemas
        .iter()
        .flat_map(|schema| &schema.vertex_labels)
        .flat_map(|label| label.uncommitted_out_edge_labels.iter().chain(&label.uncommitted_in_edge_labels))
        .map(|role| &role.edge_label)
        .filter(|edge| !edge.partition_type.is_none());
    for edge in refs {
        let Some(header) = changes
            .schemas
            .get_mut(&edge.schema)
            .and_then(|delta| delta.edge_labels.get_mut(&edge.label))
            .and_then(|delta| delta.created.as_mut())
        else {
            continue;
        };
        if header.partition_type.is_none() {
            header.partition_type = edge.partition_type;
            header.partition_expression = edge.partition_expression.clone();
        } else if header.partition_type != edge.partition_type
            || header.partition_expression != edge.partition_expression
        {
            return Err(TopologyError::Codec(format!(
                "edge label {}.{} is referenced with conflicting partitioning",
                edge.schema, edge.label
            )));
        }
    }
    Ok(())
}

fn columns(messages: &[PropertyColumnMessage]) -> BTreeMap<String, PropertyColumn> {
    messages
        .iter()
        .map(|message| {
            let definition = PropertyDefinition {
                property_type: message.property_type,
                multiplicity: message.multiplicity,
                default_literal: message.default_literal.clone(),
                check_constraint: message.check_constraint.clone(),
            };
            (
                message.name.clone(),
                PropertyColumn::new(message.name.clone(), definition),
            )
        })
        .collect()
}

fn label_delta(kind: LabelKind, id: &LabelId, message: &LabelMessage) -> TopologyResult<LabelDelta> {
    let mut delta = LabelDelta {
        created: message.created.then(|| LabelHeader {
            identifiers: message.identifiers.clone(),
            partition_type: message.partition_type,
            partition_expression: message.partition_expression.clone(),
        }),
        properties: columns(&message.uncommitted_properties),
        updated_properties: columns(&message.uncommitted_updated_properties),
        removed_properties: message.uncommitted_removed_properties.iter().cloned().collect(),
        renamed_properties: message
            .uncommitted_renamed_properties
            .iter()
            .map(|rename| (rename.to.clone(), rename.from.clone()))
            .collect(),
        indexes: message
            .uncommitted_indexes
            .iter()
            .map(|index| (index.name.clone(), index.clone()))
            .collect(),
        removed_indexes: message.uncommitted_removed_indexes.iter().cloned().collect(),
        partitions: message
            .uncommitted_partitions
            .iter()
            .map(|partition| (partition.name.clone(), partition.clone()))
            .collect(),
        removed_partitions: message.uncommitted_removed_partitions.iter().cloned().collect(),
        ..Default::default()
    };

    let has_roles = !message.uncommitted_out_edge_labels.is_empty()
        || !message.uncommitted_in_edge_labels.is_empty()
        || !message.uncommitted_removed_out_edge_labels.is_empty()
        || !message.uncommitted_removed_in_edge_labels.is_empty();
    if kind == LabelKind::Edge && has_roles {
        return Err(TopologyError::Codec(format!(
            "edge label {} carries edge roles",
            id
        )));
    }
    for (direction, added, removed) in [
        (
            Direction::Out,
            &message.uncommitted_out_edge_labels,
            &message.uncommitted_removed_out_edge_labels,
        ),
        (
            Direction::In,
            &message.uncommitted_in_edge_labels,
            &message.uncommitted_removed_in_edge_labels,
        ),
    ] {
        for role in added {
            if role.direction != direction {
                return Err(TopologyError::Codec(format!(
                    "{} role of {} listed as {}",
                    role.direction, id, direction
                )));
            }
            let edge = LabelId::new(role.edge_label.schema.clone(), role.edge_label.label.clone());
            let edge_role = EdgeRole::new(id.clone(), edge.clone(), direction, role.multiplicity);
            match direction {
                Direction::Out => delta.out_edge_roles.insert(edge, edge_role),
                Direction::In => delta.in_edge_roles.insert(edge, edge_role),
            };
        }
        for role in removed {
            let edge = LabelId::new(role.schema.clone(), role.label.clone());
            match direction {
                Direction::Out => delta.removed_out_edge_roles.insert(edge, role.remove_type),
                Direction::In => delta.removed_in_edge_roles.insert(edge, role.remove_type),
            };
        }
    }
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::catalog::Catalog;
    use crate::topology::change_set::Renames;
    use crate::topology::edge_label::EdgeLabel;
    use crate::topology::label::{LabelCore, PartitionType};
    use crate::topology::multiplicity::Multiplicity;
    use crate::topology::property::PropertyType;
    use crate::topology::vertex_label::VertexLabel;

    fn changes() -> ChangeSet {
        let base = Catalog::with_schema("public");
        let mut working = base.clone();
        let mut person = LabelCore::new(LabelId::new("public", "Person"), Vec::new());
        person.properties.insert(
            "name".to_string(),
            PropertyColumn::new(
                "name",
                PropertyDefinition::of(PropertyType::String).with_multiplicity(Multiplicity::required()),
            ),
        );
        working.insert_vertex_label(VertexLabel::from_core(person));
        working.insert_edge_label(EdgeLabel::from_core(LabelCore::new(
            LabelId::new("public", "knows"),
            Vec::new(),
        )));
        working.attach_role(EdgeRole::new(
            LabelId::new("public", "Person"),
            LabelId::new("public", "knows"),
            Direction::Out,
            Multiplicity::many(),
        ));
        ChangeSet::between(&base, &working, &Renames::default())
    }

    #[test]
    fn test_change_set_survives_the_wire() {
        let changes = changes();
        let notification = NotificationCodec::from_change_set(Uuid::new_v4(), &changes);
        let decoded = NotificationCodec::decode(&NotificationCodec::encode(&notification).unwrap()).unwrap();
        assert_eq!(decoded, notification);
        assert_eq!(NotificationCodec::to_change_set(&decoded).unwrap(), changes);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut notification = NotificationCodec::from_change_set(Uuid::new_v4(), &changes());
        notification.version = NotificationCodec::CURRENT_VERSION + 1;
        let payload = NotificationCodec::encode(&notification).unwrap();
        assert!(matches!(
            NotificationCodec::decode(&payload),
            Err(TopologyError::Codec(_))
        ));
    }

    #[test]
    fn test_role_carries_edge_partitioning() {
        let base = Catalog::with_schema("public");
        let mut working = base.clone();
        working.insert_vertex_label(VertexLabel::from_core(LabelCore::new(
            LabelId::new("public", "Person"),
            Vec::new(),
        )));
        let mut knows = LabelCore::new(LabelId::new("public", "knows"), vec!["since".to_string()])
            .partitioned(PartitionType::Range, Some("since".to_string()));
        knows.properties.insert(
            "since".to_string(),
            PropertyColumn::new("since", PropertyDefinition::of(PropertyType::LocalDate)),
        );
        working.insert_edge_label(EdgeLabel::from_core(knows));
        working.attach_role(EdgeRole::new(
            LabelId::new("public", "Person"),
            LabelId::new("public", "knows"),
            Direction::Out,
            Multiplicity::many(),
        ));
        let changes = ChangeSet::between(&base, &working, &Renames::default());

        let notification = NotificationCodec::from_change_set(Uuid::new_v4(), &changes);
        let mut value = serde_json::to_value(&notification).unwrap();
        let edge_ref = &value["schemas"][0]["vertexLabels"][0]["uncommittedOutEdgeLabels"][0]["edgeLabel"];
        assert_eq!(edge_ref["partitionType"], "RANGE");
        assert_eq!(edge_ref["partitionExpression"], "since");

        // a writer that leaves partitioning off the edge label message
        let edge = value["schemas"][0]["edgeLabels"][0].as_object_mut().unwrap();
        edge.remove("partitionType");
        edge.remove("partitionExpression");
        let stripped: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(NotificationCodec::to_change_set(&stripped).unwrap(), changes);

        let mut conflicting = notification.clone();
        conflicting.schemas[0].vertex_labels[0].uncommitted_out_edge_labels[0]
            .edge_label
            .partition_type = PartitionType::List;
        assert!(matches!(
            NotificationCodec::to_change_set(&conflicting),
            Err(TopologyError::Codec(_))
        ));
    }

    #[test]
    fn test_wire_field_names() {
        let notification = NotificationCodec::from_change_set(Uuid::new_v4(), &changes());
        let value = serde_json::to_value(&notification).unwrap();
        let person = &value["schemas"][0]["vertexLabels"][0];
        assert_eq!(person["label"], "Person");
        assert_eq!(person["uncommittedProperties"][0]["propertyType"], "STRING");
        assert_eq!(person["uncommittedOutEdgeLabels"][0]["direction"], "OUT");
        assert!(person.get("uncommittedInEdgeLabels").is_none());
    }
}
