// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-transaction structural change tracking
//!
//! A transaction that changes the topology works on a private copy of the
//! committed catalog. Reads inside the transaction go to that copy, every
//! other transaction keeps reading the committed snapshot. At commit the
//! copy is compared with the snapshot it started from and the difference
//! becomes a [`ChangeSet`]: the delta that is merged into the committed
//! catalog, persisted, and broadcast to replicas.

use super::catalog::Catalog;
use super::edge_role::{Direction, EdgeRemoveType, EdgeRole};
use super::label::{AbstractLabel, Index, LabelCore, LabelId, LabelKind, Partition, PartitionType};
use super::property::PropertyColumn;
use super::schema::Schema;
use super::vertex_label::VertexLabel;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Structural delta of one commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub schemas: BTreeMap<String, SchemaDelta>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.schemas.values().all(SchemaDelta::is_empty)
    }

    /// Number of labels created, changed or removed
    pub fn label_count(&self) -> usize {
        self.schemas
            .values()
            .map(|s| {
                s.vertex_labels.len()
                    + s.edge_labels.len()
                    + s.removed_vertex_labels.len()
                    + s.removed_edge_labels.len()
            })
            .sum()
    }

    /// Compute the delta that turns `base` into `working`
    pub(crate) fn between(base: &Catalog, working: &Catalog, renames: &Renames) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (name, schema) in working.schemas() {
            if schema.is_foreign() {
                continue;
            }
            let delta = match base.schema(name) {
                None => SchemaDelta::created_from(schema),
                Some(old) if Arc::ptr_eq(old, schema) => continue,
                Some(old) => SchemaDelta::between(old, schema, working, renames),
            };
            if !delta.is_empty() {
                changes.schemas.insert(name.clone(), delta);
            }
        }
        for (name, schema) in base.schemas() {
            if working.schema(name).is_none() && !schema.is_foreign() {
                changes
                    .schemas
                    .insert(name.clone(), SchemaDelta::removed_from(schema));
            }
        }
        changes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDelta {
    pub created: bool,
    pub removed: bool,
    pub vertex_labels: BTreeMap<String, LabelDelta>,
    pub edge_labels: BTreeMap<String, LabelDelta>,
    pub removed_vertex_labels: BTreeSet<String>,
    pub removed_edge_labels: BTreeSet<String>,
    /// New name to old name
    pub renamed_vertex_labels: BTreeMap<String, String>,
    /// New name to old name
    pub renamed_edge_labels: BTreeMap<String, String>,
}

impl SchemaDelta {
    pub fn is_empty(&self) -> bool {
        !self.created
            && !self.removed
            && self.vertex_labels.is_empty()
            && self.edge_labels.is_empty()
            && self.removed_vertex_labels.is_empty()
            && self.removed_edge_labels.is_empty()
    }

    pub fn labels(&self, kind: LabelKind) -> &BTreeMap<String, LabelDelta> {
        match kind {
            LabelKind::Vertex => &self.vertex_labels,
            LabelKind::Edge => &self.edge_labels,
        }
    }

    pub fn removed_labels(&self, kind: LabelKind) -> &BTreeSet<String> {
        match kind {
            LabelKind::Vertex => &self.removed_vertex_labels,
            LabelKind::Edge => &self.removed_edge_labels,
        }
    }

    pub fn renamed_labels(&self, kind: LabelKind) -> &BTreeMap<String, String> {
        match kind {
            LabelKind::Vertex => &self.renamed_vertex_labels,
            LabelKind::Edge => &self.renamed_edge_labels,
        }
    }

    fn created_from(schema: &Schema) -> Self {
        let mut delta = SchemaDelta {
            created: true,
            ..Default::default()
        };
        for (name, label) in schema.vertex_labels() {
            delta
                .vertex_labels
                .insert(name.clone(), LabelDelta::created_from_vertex(label));
        }
        for (name, label) in schema.edge_labels() {
            delta
                .edge_labels
                .insert(name.clone(), LabelDelta::created_from_core(label.core()));
        }
        delta
    }

    fn removed_from(schema: &Schema) -> Self {
        SchemaDelta {
            removed: true,
            removed_vertex_labels: schema.vertex_labels().keys().cloned().collect(),
            removed_edge_labels: schema.edge_labels().keys().cloned().collect(),
            ..Default::default()
        }
    }

    fn between(old: &Schema, new: &Schema, working: &Catalog, renames: &Renames) -> Self {
        let mut delta = SchemaDelta::default();

        for (name, label) in new.vertex_labels() {
            match old.vertex_label(name) {
                None => {
                    if let Some(origin) = renames.label_origin(LabelKind::Vertex, label.id()) {
                        if old.vertex_label(origin).is_some() && new.vertex_label(origin).is_none() {
                            delta
                                .renamed_vertex_labels
                                .insert(name.clone(), origin.to_string());
                        }
                    }
                    delta
                        .vertex_labels
                        .insert(name.clone(), LabelDelta::created_from_vertex(label));
                }
                Some(previous) if Arc::ptr_eq(previous, label) => {}
                Some(previous) => {
                    let mut label_delta = LabelDelta::between_cores(
                        LabelKind::Vertex,
                        previous.core(),
                        label.core(),
                        renames,
                    );
                    label_delta.diff_roles(previous, label, working);
                    if !label_delta.is_empty() {
                        delta.vertex_labels.insert(name.clone(), label_delta);
                    }
                }
            }
        }

        for (name, label) in new.edge_labels() {
            match old.edge_label(name) {
                None => {
                    if let Some(origin) = renames.label_origin(LabelKind::Edge, label.id()) {
                        if old.edge_label(origin).is_some() && new.edge_label(origin).is_none() {
                            delta
                                .renamed_edge_labels
                                .insert(name.clone(), origin.to_string());
                        }
                    }
                    delta
                        .edge_labels
                        .insert(name.clone(), LabelDelta::created_from_core(label.core()));
                }
                Some(previous) if Arc::ptr_eq(previous, label) => {}
                Some(previous) => {
                    let label_delta =
                        LabelDelta::between_cores(LabelKind::Edge, previous.core(), label.core(), renames);
                    if !label_delta.is_empty() {
                        delta.edge_labels.insert(name.clone(), label_delta);
                    }
                }
            }
        }

        delta.removed_vertex_labels = old
            .vertex_labels()
            .keys()
            .filter(|name| new.vertex_label(name).is_none())
            .cloned()
            .collect();
        delta.removed_edge_labels = old
            .edge_labels()
            .keys()
            .filter(|name| new.edge_label(name).is_none())
            .cloned()
            .collect();
        delta
    }
}

/// Identity and layout of a newly created label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelHeader {
    pub identifiers: Vec<String>,
    pub partition_type: PartitionType,
    pub partition_expression: Option<String>,
}

impl LabelHeader {
    pub(crate) fn to_core(&self, id: LabelId) -> LabelCore {
        LabelCore::new(id, self.identifiers.clone())
            .partitioned(self.partition_type, self.partition_expression.clone())
    }
}

/// Changes to one label. Role fields are only used for vertex labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    pub created: Option<LabelHeader>,
    pub properties: BTreeMap<String, PropertyColumn>,
    pub updated_properties: BTreeMap<String, PropertyColumn>,
    pub removed_properties: BTreeSet<String>,
    /// New name to old name
    pub renamed_properties: BTreeMap<String, String>,
    pub indexes: BTreeMap<String, Index>,
    pub removed_indexes: BTreeSet<String>,
    pub partitions: BTreeMap<String, Partition>,
    pub removed_partitions: BTreeSet<String>,
    pub out_edge_roles: BTreeMap<LabelId, EdgeRole>,
    pub removed_out_edge_roles: BTreeMap<LabelId, EdgeRemoveType>,
    pub in_edge_roles: BTreeMap<LabelId, EdgeRole>,
    pub removed_in_edge_roles: BTreeMap<LabelId, EdgeRemoveType>,
}

impl LabelDelta {
    pub fn is_empty(&self) -> bool {
        self.created.is_none()
            && self.properties.is_empty()
            && self.updated_properties.is_empty()
            && self.removed_properties.is_empty()
            && self.renamed_properties.is_empty()
            && self.indexes.is_empty()
            && self.removed_indexes.is_empty()
            && self.partitions.is_empty()
            && self.removed_partitions.is_empty()
            && self.out_edge_roles.is_empty()
            && self.removed_out_edge_roles.is_empty()
            && self.in_edge_roles.is_empty()
            && self.removed_in_edge_roles.is_empty()
    }

    pub fn edge_roles(&self, direction: Direction) -> &BTreeMap<LabelId, EdgeRole> {
        match direction {
            Direction::Out => &self.out_edge_roles,
            Direction::In => &self.in_edge_roles,
        }
    }

    pub fn removed_edge_roles(&self, direction: Direction) -> &BTreeMap<LabelId, EdgeRemoveType> {
        match direction {
            Direction::Out => &self.removed_out_edge_roles,
            Direction::In => &self.removed_in_edge_roles,
        }
    }

    fn created_from_core(core: &LabelCore) -> Self {
        LabelDelta {
            created: Some(LabelHeader {
                identifiers: core.identifiers.clone(),
                partition_type: core.partition_type,
                partition_expression: core.partition_expression.clone(),
            }),
            properties: core.properties.clone(),
            indexes: core.indexes.clone(),
            partitions: core.partitions.clone(),
            ..Default::default()
        }
    }

    fn created_from_vertex(label: &VertexLabel) -> Self {
        let mut delta = Self::created_from_core(label.core());
        delta.out_edge_roles = label.out_edge_roles().clone();
        delta.in_edge_roles = label.in_edge_roles().clone();
        delta
    }

    fn between_cores(kind: LabelKind, old: &LabelCore, new: &LabelCore, renames: &Renames) -> Self {
        let mut delta = LabelDelta::default();
        let mut rename_origins = BTreeSet::new();

        for (name, column) in &new.properties {
            match old.properties.get(name) {
                Some(previous) => {
                    if !previous.same_definition(column) {
                        delta.updated_properties.insert(name.clone(), column.clone());
                    }
                }
                None => {
                    let origin = renames
                        .property_origin(kind, &new.id, name)
                        .filter(|origin| {
                            old.properties.contains_key(*origin)
                                && !new.properties.contains_key(*origin)
                        });
                    match origin {
                        Some(origin) => {
                            delta
                                .renamed_properties
                                .insert(name.clone(), origin.to_string());
                            rename_origins.insert(origin.to_string());
                            if !old.properties[origin].same_definition(column) {
                                delta.updated_properties.insert(name.clone(), column.clone());
                            }
                        }
                        None => {
                            delta.properties.insert(name.clone(), column.clone());
                        }
                    }
                }
            }
        }
        delta.removed_properties = old
            .properties
            .keys()
            .filter(|name| !new.properties.contains_key(*name) && !rename_origins.contains(*name))
            .cloned()
            .collect();

        for (name, index) in &new.indexes {
            if old.indexes.get(name) != Some(index) {
                delta.indexes.insert(name.clone(), index.clone());
            }
        }
        delta.removed_indexes = old
            .indexes
            .keys()
            .filter(|name| !new.indexes.contains_key(*name))
            .cloned()
            .collect();

        for (name, partition) in &new.partitions {
            if old.partitions.get(name) != Some(partition) {
                delta.partitions.insert(name.clone(), partition.clone());
            }
        }
        delta.removed_partitions = old
            .partitions
            .keys()
            .filter(|name| !new.partitions.contains_key(*name))
            .cloned()
            .collect();
        delta
    }

    fn diff_roles(&mut self, old: &VertexLabel, new: &VertexLabel, working: &Catalog) {
        for direction in [Direction::Out, Direction::In] {
            let before = old.edge_roles(direction);
            let after = new.edge_roles(direction);
            let added: BTreeMap<LabelId, EdgeRole> = after
                .iter()
                .filter(|(edge, role)| before.get(*edge) != Some(*role))
                .map(|(edge, role)| (edge.clone(), role.clone()))
                .collect();
            let removed: BTreeMap<LabelId, EdgeRemoveType> = before
                .keys()
                .filter(|edge| !after.contains_key(*edge))
                .map(|edge| {
                    let remove_type = if working.edge_label(edge).is_some() {
                        EdgeRemoveType::EdgeRole
                    } else {
                        EdgeRemoveType::EdgeLabel
                    };
                    (edge.clone(), remove_type)
                })
                .collect();
            match direction {
                Direction::Out => {
                    self.out_edge_roles = added;
                    self.removed_out_edge_roles = removed;
                }
                Direction::In => {
                    self.in_edge_roles = added;
                    self.removed_in_edge_roles = removed;
                }
            }
        }
    }
}

/// Rename hints recorded while a transaction works.
///
/// A diff alone sees a rename as a removal plus a creation; the hints let
/// the delta report it as one update.
#[derive(Debug, Clone, Default)]
pub(crate) struct Renames {
    labels: BTreeMap<(LabelKind, LabelId), String>,
    properties: BTreeMap<(LabelKind, LabelId, String), String>,
}

impl Renames {
    pub(crate) fn record_label(&mut self, kind: LabelKind, old: &LabelId, new_name: &str) {
        let origin = self
            .labels
            .remove(&(kind, old.clone()))
            .unwrap_or_else(|| old.label.clone());
        let new_id = old.renamed(new_name);
        if origin != new_name {
            self.labels.insert((kind, new_id.clone()), origin);
        }
        let moved: Vec<_> = self
            .properties
            .keys()
            .filter(|(k, id, _)| *k == kind && id == old)
            .cloned()
            .collect();
        for key in moved {
            if let Some(origin) = self.properties.remove(&key) {
                self.properties.insert((kind, new_id.clone(), key.2), origin);
            }
        }
    }

    pub(crate) fn record_property(&mut self, kind: LabelKind, label: &LabelId, old: &str, new: &str) {
        let origin = self
            .properties
            .remove(&(kind, label.clone(), old.to_string()))
            .unwrap_or_else(|| old.to_string());
        if origin != new {
            self.properties
                .insert((kind, label.clone(), new.to_string()), origin);
        }
    }

    fn label_origin(&self, kind: LabelKind, id: &LabelId) -> Option<&str> {
        self.labels.get(&(kind, id.clone())).map(String::as_str)
    }

    fn property_origin(&self, kind: LabelKind, label: &LabelId, name: &str) -> Option<&str> {
        self.properties
            .get(&(kind, label.clone(), name.to_string()))
            .map(String::as_str)
    }
}

/// Private working state of a transaction that changes structure
#[derive(Debug, Clone)]
pub(crate) struct SchemaWork {
    pub(crate) base: Arc<Catalog>,
    pub(crate) working: Catalog,
    pub(crate) renames: Renames,
}

impl SchemaWork {
    pub(crate) fn new(base: Arc<Catalog>) -> Self {
        let working = (*base).clone();
        Self {
            base,
            working,
            renames: Renames::default(),
        }
    }

    pub(crate) fn change_set(&self) -> ChangeSet {
        ChangeSet::between(&self.base, &self.working, &self.renames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::multiplicity::Multiplicity;
    use crate::topology::property::{PropertyDefinition, PropertyType};

    fn column(name: &str) -> PropertyColumn {
        PropertyColumn::new(name, PropertyDefinition::of(PropertyType::String))
    }

    fn base_with_vertex() -> Catalog {
        let mut catalog = Catalog::with_schema("public");
        let mut core = LabelCore::new(LabelId::new("public", "A"), Vec::new());
        core.properties.insert("name".to_string(), column("name"));
        catalog.insert_vertex_label(VertexLabel::from_core(core));
        catalog
    }

    #[test]
    fn test_unchanged_working_copy_has_empty_delta() {
        let work = SchemaWork::new(Arc::new(base_with_vertex()));
        assert!(work.change_set().is_empty());
    }

    #[test]
    fn test_added_and_removed_properties() {
        let mut work = SchemaWork::new(Arc::new(base_with_vertex()));
        let id = LabelId::new("public", "A");
        let core = work.working.label_core_mut(LabelKind::Vertex, &id).unwrap();
        core.properties.remove("name");
        core.properties.insert("age".to_string(), column("age"));

        let changes = work.change_set();
        let delta = &changes.schemas["public"].vertex_labels["A"];
        assert!(delta.created.is_none());
        assert!(delta.properties.contains_key("age"));
        assert!(delta.removed_properties.contains("name"));
    }

    #[test]
    fn test_property_rename_is_reported_once() {
        let mut work = SchemaWork::new(Arc::new(base_with_vertex()));
        let id = LabelId::new("public", "A");
        work.working
            .label_core_mut(LabelKind::Vertex, &id)
            .unwrap()
            .rename_property("name", "title");
        work.renames
            .record_property(LabelKind::Vertex, &id, "name", "title");

        let changes = work.change_set();
        let delta = &changes.schemas["public"].vertex_labels["A"];
        assert_eq!(delta.renamed_properties["title"], "name");
        assert!(delta.properties.is_empty());
        assert!(delta.removed_properties.is_empty());
    }

    #[test]
    fn test_rename_back_clears_hint() {
        let mut renames = Renames::default();
        let id = LabelId::new("public", "A");
        renames.record_label(LabelKind::Vertex, &id, "B");
        renames.record_label(LabelKind::Vertex, &LabelId::new("public", "B"), "A");
        assert!(renames.label_origin(LabelKind::Vertex, &id).is_none());
    }

    #[test]
    fn test_new_schema_lists_labels_and_roles() {
        let base = Arc::new(Catalog::with_schema("public"));
        let mut work = SchemaWork::new(base);
        work.working.insert_schema(Schema::new("graph"));
        let a = LabelId::new("graph", "A");
        let ab = LabelId::new("graph", "ab");
        let mut vertex = VertexLabel::from_core(LabelCore::new(a.clone(), Vec::new()));
        vertex.out_edge_roles.insert(
            ab.clone(),
            EdgeRole::new(a.clone(), ab.clone(), Direction::Out, Multiplicity::many()),
        );
        work.working.insert_vertex_label(vertex);

        let changes = work.change_set();
        let delta = &changes.schemas["graph"];
        assert!(delta.created);
        assert!(delta.vertex_labels["A"].created.is_some());
        assert!(delta.vertex_labels["A"].out_edge_roles.contains_key(&ab));
    }
}
