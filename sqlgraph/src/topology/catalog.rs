// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Committed topology catalog
//!
//! The catalog is an arena of schemas addressed by name, each owning its
//! labels through `Arc`s so snapshots are cheap to clone and copy-on-write
//! to modify. Edge roles refer to labels by [`LabelId`], never by pointer.
//!
//! [`Catalog::apply`] is the single merge routine: local commits, remote
//! notifications and recovery all go through it.

use super::change_set::{ChangeSet, LabelDelta, SchemaDelta};
use super::edge_label::EdgeLabel;
use super::edge_role::{Direction, EdgeRemoveType, EdgeRole};
use super::foreign_key::{ForeignKey, ForeignKeyCache};
use super::label::{AbstractLabel, Label, LabelCore, LabelId, LabelKind};
use super::listener::{TopologyElement, TopologyEvent};
use super::schema::Schema;
use super::vertex_label::VertexLabel;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    schemas: BTreeMap<String, Arc<Schema>>,
    foreign_keys: ForeignKeyCache,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding one empty schema
    pub fn with_schema(name: &str) -> Self {
        let mut catalog = Self::new();
        catalog.insert_schema(Schema::new(name));
        catalog
    }

    pub fn schemas(&self) -> &BTreeMap<String, Arc<Schema>> {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(name)
    }

    pub fn vertex_label(&self, id: &LabelId) -> Option<&Arc<VertexLabel>> {
        self.schemas
            .get(&id.schema)
            .and_then(|schema| schema.vertex_labels.get(&id.label))
    }

    pub fn edge_label(&self, id: &LabelId) -> Option<&Arc<EdgeLabel>> {
        self.schemas
            .get(&id.schema)
            .and_then(|schema| schema.edge_labels.get(&id.label))
    }

    pub fn label(&self, kind: LabelKind, id: &LabelId) -> Option<Label> {
        self.schemas
            .get(&id.schema)
            .and_then(|schema| schema.label(kind, &id.label))
    }

    /// Every label of every schema
    pub fn labels(&self) -> Vec<Label> {
        self.schemas
            .values()
            .flat_map(|schema| schema.labels().collect::<Vec<_>>())
            .collect()
    }

    /// All roles of an edge label, out roles first
    pub fn edge_roles(&self, edge: &LabelId) -> Vec<EdgeRole> {
        let Some(edge_label) = self.edge_label(edge) else {
            return Vec::new();
        };
        let mut roles = Vec::new();
        for direction in [Direction::Out, Direction::In] {
            for vertex in edge_label.vertex_labels(direction) {
                if let Some(role) = self
                    .vertex_label(vertex)
                    .and_then(|label| label.edge_role(direction, edge))
                {
                    roles.push(role.clone());
                }
            }
        }
        roles
    }

    /// Foreign key columns of the edge table for one role
    pub fn foreign_key(&self, role: &EdgeRole) -> Option<ForeignKey> {
        self.vertex_label(role.vertex_label())
            .map(|vertex| ForeignKey::for_vertex(vertex, role.direction()))
    }

    pub fn foreign_keys(&self) -> &ForeignKeyCache {
        &self.foreign_keys
    }

    /// Recompute the foreign key cache from the roles
    pub fn rebuild_foreign_keys(&self) -> ForeignKeyCache {
        let mut cache = ForeignKeyCache::new();
        for schema in self.schemas.values() {
            for vertex in schema.vertex_labels.values() {
                for role in vertex.all_edge_roles() {
                    cache.add_role(role, vertex);
                }
            }
        }
        cache
    }

    /// Replace the foreign key cache with one rebuilt from the roles
    pub(crate) fn reindex_foreign_keys(&mut self) {
        self.foreign_keys = self.rebuild_foreign_keys();
    }

    pub(crate) fn insert_schema(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
    }

    pub(crate) fn remove_schema_entry(&mut self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.remove(name)
    }

    pub(crate) fn schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.get_mut(name).map(Arc::make_mut)
    }

    pub(crate) fn vertex_label_mut(&mut self, id: &LabelId) -> Option<&mut VertexLabel> {
        self.schema_mut(&id.schema)
            .and_then(|schema| schema.vertex_labels.get_mut(&id.label))
            .map(Arc::make_mut)
    }

    pub(crate) fn edge_label_mut(&mut self, id: &LabelId) -> Option<&mut EdgeLabel> {
        self.schema_mut(&id.schema)
            .and_then(|schema| schema.edge_labels.get_mut(&id.label))
            .map(Arc::make_mut)
    }

    pub(crate) fn label_core(&self, kind: LabelKind, id: &LabelId) -> Option<&LabelCore> {
        match kind {
            LabelKind::Vertex => self.vertex_label(id).map(|label| label.core()),
            LabelKind::Edge => self.edge_label(id).map(|label| label.core()),
        }
    }

    pub(crate) fn label_core_mut(&mut self, kind: LabelKind, id: &LabelId) -> Option<&mut LabelCore> {
        match kind {
            LabelKind::Vertex => self.vertex_label_mut(id).map(VertexLabel::core_mut),
            LabelKind::Edge => self.edge_label_mut(id).map(EdgeLabel::core_mut),
        }
    }

    pub(crate) fn insert_vertex_label(&mut self, label: VertexLabel) {
        if let Some(schema) = self.schema_mut(&label.core.id.schema) {
            schema
                .vertex_labels
                .insert(label.core.id.label.clone(), Arc::new(label));
        }
    }

    pub(crate) fn insert_edge_label(&mut self, label: EdgeLabel) {
        if let Some(schema) = self.schema_mut(&label.core.id.schema) {
            schema
                .edge_labels
                .insert(label.core.id.label.clone(), Arc::new(label));
        }
    }

    /// Attach a role to its vertex label and edge label
    pub(crate) fn attach_role(&mut self, role: EdgeRole) {
        let direction = role.direction();
        if let Some(edge) = self.edge_label_mut(role.edge_label()) {
            edge.vertex_labels_mut(direction)
                .insert(role.vertex_label().clone());
        }
        let Some(vertex) = self.vertex_label_mut(role.vertex_label()) else {
            return;
        };
        vertex
            .edge_roles_mut(direction)
            .insert(role.edge_label().clone(), role.clone());
        let foreign_key = ForeignKey::for_vertex(vertex, direction);
        self.foreign_keys.remove_role(&role);
        self.foreign_keys.add(role.edge_label(), foreign_key);
    }

    /// Detach a role from both sides. Returns the removed role.
    pub(crate) fn detach_role(
        &mut self,
        vertex: &LabelId,
        edge: &LabelId,
        direction: Direction,
    ) -> Option<EdgeRole> {
        if let Some(edge_label) = self.edge_label_mut(edge) {
            edge_label.vertex_labels_mut(direction).remove(vertex);
        }
        self.foreign_keys.remove(edge, vertex, direction);
        self.vertex_label_mut(vertex)
            .and_then(|label| label.edge_roles_mut(direction).remove(edge))
    }

    /// Remove an edge label and every role pointing at it
    pub(crate) fn remove_edge_label_entry(&mut self, id: &LabelId) -> Option<Arc<EdgeLabel>> {
        let label = self.schema_mut(&id.schema)?.edge_labels.remove(&id.label)?;
        for direction in [Direction::Out, Direction::In] {
            for vertex in label.vertex_labels(direction) {
                if let Some(vertex_label) = self.vertex_label_mut(vertex) {
                    vertex_label.edge_roles_mut(direction).remove(id);
                }
            }
        }
        self.foreign_keys.remove_table(id);
        Some(label)
    }

    /// Remove a vertex label and detach its roles from their edge labels
    pub(crate) fn remove_vertex_label_entry(&mut self, id: &LabelId) -> Option<Arc<VertexLabel>> {
        let label = self.schema_mut(&id.schema)?.vertex_labels.remove(&id.label)?;
        for role in label.all_edge_roles() {
            if let Some(edge) = self.edge_label_mut(role.edge_label()) {
                edge.vertex_labels_mut(role.direction()).remove(id);
            }
            self.foreign_keys.remove_role(role);
        }
        Some(label)
    }

    /// Recompute the foreign keys of every role of a vertex label
    pub(crate) fn refresh_foreign_keys(&mut self, vertex: &LabelId) {
        let Some(label) = self.vertex_label(vertex).cloned() else {
            return;
        };
        for role in label.all_edge_roles() {
            self.foreign_keys.remove_role(role);
            self.foreign_keys.add_role(role, &label);
        }
    }

    /// Merge a delta into this catalog, returning one event per actual change.
    ///
    /// Application is idempotent: entities already present are left alone,
    /// removals of absent entities are ignored, and neither produces an
    /// event. Work runs in dependency order: schemas, labels, properties,
    /// indexes, partitions, edge roles, removals.
    pub fn apply(&mut self, changes: &ChangeSet) -> Vec<TopologyEvent> {
        let mut events = Vec::new();
        let renamed = renamed_targets(changes);

        for (name, delta) in &changes.schemas {
            if delta.created && !self.schemas.contains_key(name) {
                self.insert_schema(Schema::new(name.clone()));
                events.push(TopologyEvent::create(TopologyElement::Schema(name.clone())));
            }
        }

        for (schema, delta) in &changes.schemas {
            if !self.schemas.contains_key(schema) {
                if !delta.removed {
                    log::warn!("Skipping changes for unknown schema {}", schema);
                }
                continue;
            }
            for kind in [LabelKind::Vertex, LabelKind::Edge] {
                for (name, label_delta) in delta.labels(kind) {
                    let id = LabelId::new(schema.clone(), name.clone());
                    self.apply_label_header(kind, &id, label_delta, &renamed, &mut events);
                }
            }
        }

        for_each_label(changes, |kind, id, delta| {
            self.apply_properties(kind, id, delta, &renamed, &mut events)
        });
        for_each_label(changes, |kind, id, delta| {
            self.apply_indexes(kind, id, delta, &renamed, &mut events)
        });
        for_each_label(changes, |kind, id, delta| {
            self.apply_partitions(kind, id, delta, &renamed, &mut events)
        });
        for_each_label(changes, |kind, id, delta| {
            if kind == LabelKind::Vertex {
                self.apply_edge_roles(id, delta, &renamed, &mut events);
            }
        });

        for (schema, delta) in &changes.schemas {
            self.apply_removals(schema, delta, &mut events);
        }

        events
    }

    fn apply_label_header(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        delta: &LabelDelta,
        renamed: &BTreeSet<(LabelKind, LabelId)>,
        events: &mut Vec<TopologyEvent>,
    ) {
        let Some(header) = &delta.created else {
            return;
        };
        if self.label_core(kind, id).is_some() {
            return;
        }
        let core = header.to_core(id.clone());
        let quiet = renamed.contains(&(kind, id.clone()));
        match kind {
            LabelKind::Vertex => {
                let label = VertexLabel::from_core(core);
                if !quiet {
                    events.push(TopologyEvent::create(TopologyElement::VertexLabel(Arc::new(
                        label.clone(),
                    ))));
                }
                self.insert_vertex_label(label);
            }
            LabelKind::Edge => {
                let label = EdgeLabel::from_core(core);
                if !quiet {
                    events.push(TopologyEvent::create(TopologyElement::EdgeLabel(Arc::new(
                        label.clone(),
                    ))));
                }
                self.insert_edge_label(label);
            }
        }
    }

    fn apply_properties(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        delta: &LabelDelta,
        renamed: &BTreeSet<(LabelKind, LabelId)>,
        events: &mut Vec<TopologyEvent>,
    ) {
        let quiet = renamed.contains(&(kind, id.clone()));
        let mut identifiers_changed = false;
        {
            let Some(core) = self.label_core_mut(kind, id) else {
                if !delta.is_empty() {
                    log::warn!("Skipping changes for unknown {} label {}", kind, id);
                }
                return;
            };
            let mut emit = |event: TopologyEvent| {
                if !quiet {
                    events.push(event);
                }
            };
            let property = |column: &super::property::PropertyColumn| TopologyElement::Property {
                label: id.clone(),
                column: column.clone(),
            };

            for (new, old) in &delta.renamed_properties {
                if core.properties.contains_key(new) || !core.properties.contains_key(old) {
                    continue;
                }
                let previous = core.properties[old].clone();
                identifiers_changed |= core.identifiers.contains(old);
                core.rename_property(old, new);
                emit(TopologyEvent::update(
                    property(&core.properties[new]),
                    property(&previous),
                ));
            }

            for (name, column) in delta.properties.iter().chain(&delta.updated_properties) {
                match core.properties.get(name) {
                    Some(existing) if existing.same_definition(column) => {}
                    Some(existing) => {
                        let previous = existing.clone();
                        core.properties.insert(name.clone(), column.clone());
                        emit(TopologyEvent::update(property(column), property(&previous)));
                    }
                    None => {
                        core.properties.insert(name.clone(), column.clone());
                        emit(TopologyEvent::create(property(column)));
                    }
                }
            }

            for name in &delta.removed_properties {
                if let Some(previous) = core.properties.remove(name) {
                    emit(TopologyEvent::delete(property(&previous)));
                }
            }
        }
        if identifiers_changed && kind == LabelKind::Vertex {
            self.refresh_foreign_keys(id);
        }
    }

    fn apply_indexes(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        delta: &LabelDelta,
        renamed: &BTreeSet<(LabelKind, LabelId)>,
        events: &mut Vec<TopologyEvent>,
    ) {
        let quiet = renamed.contains(&(kind, id.clone()));
        let Some(core) = self.label_core_mut(kind, id) else {
            return;
        };
        let element = |index: &super::label::Index| TopologyElement::Index {
            label: id.clone(),
            index: index.clone(),
        };
        for (name, index) in &delta.indexes {
            let event = match core.indexes.insert(name.clone(), index.clone()) {
                Some(previous) if previous == *index => continue,
                Some(previous) => TopologyEvent::update(element(index), element(&previous)),
                None => TopologyEvent::create(element(index)),
            };
            if !quiet {
                events.push(event);
            }
        }
        for name in &delta.removed_indexes {
            if let Some(previous) = core.indexes.remove(name) {
                if !quiet {
                    events.push(TopologyEvent::delete(element(&previous)));
                }
            }
        }
    }

    fn apply_partitions(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        delta: &LabelDelta,
        renamed: &BTreeSet<(LabelKind, LabelId)>,
        events: &mut Vec<TopologyEvent>,
    ) {
        let quiet = renamed.contains(&(kind, id.clone()));
        let Some(core) = self.label_core_mut(kind, id) else {
            return;
        };
        let element = |partition: &super::label::Partition| TopologyElement::Partition {
            label: id.clone(),
            partition: partition.clone(),
        };
        for (name, partition) in &delta.partitions {
            let event = match core.partitions.insert(name.clone(), partition.clone()) {
                Some(previous) if previous == *partition => continue,
                Some(previous) => TopologyEvent::update(element(partition), element(&previous)),
                None => TopologyEvent::create(element(partition)),
            };
            if !quiet {
                events.push(event);
            }
        }
        for name in &delta.removed_partitions {
            if let Some(previous) = core.partitions.remove(name) {
                if !quiet {
                    events.push(TopologyEvent::delete(element(&previous)));
                }
            }
        }
    }

    fn apply_edge_roles(
        &mut self,
        vertex: &LabelId,
        delta: &LabelDelta,
        renamed: &BTreeSet<(LabelKind, LabelId)>,
        events: &mut Vec<TopologyEvent>,
    ) {
        if self.vertex_label(vertex).is_none() {
            return;
        }
        for direction in [Direction::Out, Direction::In] {
            for (edge, role) in delta.edge_roles(direction) {
                if self.edge_label(edge).is_none() {
                    log::warn!(
                        "Skipping edge role {}: edge label {} does not exist",
                        role.name(),
                        edge
                    );
                    continue;
                }
                let existing = self
                    .vertex_label(vertex)
                    .and_then(|label| label.edge_role(direction, edge))
                    .cloned();
                if existing.as_ref() == Some(role) {
                    continue;
                }
                self.attach_role(role.clone());
                let quiet = renamed.contains(&(LabelKind::Vertex, vertex.clone()))
                    || renamed.contains(&(LabelKind::Edge, edge.clone()));
                if !quiet {
                    let element = TopologyElement::EdgeRole(role.clone());
                    events.push(match existing {
                        Some(previous) => {
                            TopologyEvent::update(element, TopologyElement::EdgeRole(previous))
                        }
                        None => TopologyEvent::create(element),
                    });
                }
            }
            for (edge, remove_type) in delta.removed_edge_roles(direction) {
                if let Some(previous) = self.detach_role(vertex, edge, direction) {
                    let quiet = renamed.contains(&(LabelKind::Vertex, vertex.clone()))
                        || renamed.contains(&(LabelKind::Edge, edge.clone()));
                    if *remove_type == EdgeRemoveType::EdgeRole && !quiet {
                        events.push(TopologyEvent::delete(TopologyElement::EdgeRole(previous)));
                    }
                }
            }
        }
    }

    fn apply_removals(&mut self, schema: &str, delta: &SchemaDelta, events: &mut Vec<TopologyEvent>) {
        let renamed_from = |kind: LabelKind, old: &str| -> Option<LabelId> {
            delta
                .renamed_labels(kind)
                .iter()
                .find(|(_, origin)| origin.as_str() == old)
                .map(|(new, _)| LabelId::new(schema, new.clone()))
        };

        for name in &delta.removed_edge_labels {
            let id = LabelId::new(schema, name.clone());
            if let Some(previous) = self.remove_edge_label_entry(&id) {
                let replacement = renamed_from(LabelKind::Edge, name)
                    .and_then(|new| self.edge_label(&new).cloned());
                events.push(match replacement {
                    Some(current) => TopologyEvent::update(
                        TopologyElement::EdgeLabel(current),
                        TopologyElement::EdgeLabel(previous),
                    ),
                    None => TopologyEvent::delete(TopologyElement::EdgeLabel(previous)),
                });
            }
        }

        for name in &delta.removed_vertex_labels {
            let id = LabelId::new(schema, name.clone());
            if let Some(previous) = self.remove_vertex_label_entry(&id) {
                let replacement = renamed_from(LabelKind::Vertex, name)
                    .and_then(|new| self.vertex_label(&new).cloned());
                events.push(match replacement {
                    Some(current) => TopologyEvent::update(
                        TopologyElement::VertexLabel(current),
                        TopologyElement::VertexLabel(previous),
                    ),
                    None => TopologyEvent::delete(TopologyElement::VertexLabel(previous)),
                });
            }
        }

        if delta.removed {
            if let Some(removed) = self.schemas.get(schema).cloned() {
                for edge in removed.edge_labels.values() {
                    self.remove_edge_label_entry(edge.id());
                }
                for vertex in removed.vertex_labels.values() {
                    self.remove_vertex_label_entry(vertex.id());
                }
                self.schemas.remove(schema);
                events.push(TopologyEvent::delete(TopologyElement::Schema(
                    schema.to_string(),
                )));
            }
        }
    }
}

fn renamed_targets(changes: &ChangeSet) -> BTreeSet<(LabelKind, LabelId)> {
    let mut targets = BTreeSet::new();
    for (schema, delta) in &changes.schemas {
        for kind in [LabelKind::Vertex, LabelKind::Edge] {
            for new in delta.renamed_labels(kind).keys() {
                targets.insert((kind, LabelId::new(schema.clone(), new.clone())));
            }
        }
    }
    targets
}

fn for_each_label<F>(changes: &ChangeSet, mut f: F)
where
    F: FnMut(LabelKind, &LabelId, &LabelDelta),
{
    for (schema, delta) in &changes.schemas {
        for kind in [LabelKind::Vertex, LabelKind::Edge] {
            for (name, label_delta) in delta.labels(kind) {
                f(kind, &LabelId::new(schema.clone(), name.clone()), label_delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::change_set::LabelHeader;
    use crate::topology::listener::TopologyChangeAction;
    use crate::topology::multiplicity::Multiplicity;
    use crate::topology::property::{PropertyColumn, PropertyDefinition, PropertyType};

    fn vertex_delta(properties: &[&str]) -> LabelDelta {
        LabelDelta {
            created: Some(LabelHeader::default()),
            properties: properties
                .iter()
                .map(|name| {
                    (
                        name.to_string(),
                        PropertyColumn::new(*name, PropertyDefinition::of(PropertyType::String)),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    fn ab_changes() -> ChangeSet {
        let a = LabelId::new("public", "A");
        let b = LabelId::new("public", "B");
        let ab = LabelId::new("public", "ab");
        let mut schema = SchemaDelta::default();
        let mut a_delta = vertex_delta(&["name"]);
        a_delta.out_edge_roles.insert(
            ab.clone(),
            EdgeRole::new(a, ab.clone(), Direction::Out, Multiplicity::optional()),
        );
        let mut b_delta = vertex_delta(&["name"]);
        b_delta.in_edge_roles.insert(
            ab.clone(),
            EdgeRole::new(b, ab, Direction::In, Multiplicity::optional()),
        );
        schema.vertex_labels.insert("A".to_string(), a_delta);
        schema.vertex_labels.insert("B".to_string(), b_delta);
        schema
            .edge_labels
            .insert("ab".to_string(), vertex_delta(&[]));
        let mut changes = ChangeSet::default();
        changes.schemas.insert("public".to_string(), schema);
        changes
    }

    #[test]
    fn test_apply_creates_labels_and_roles() {
        let mut catalog = Catalog::with_schema("public");
        let events = catalog.apply(&ab_changes());

        let ab = LabelId::new("public", "ab");
        let edge = catalog.edge_label(&ab).unwrap();
        assert!(edge.out_vertex_labels().contains(&LabelId::new("public", "A")));
        assert!(edge.in_vertex_labels().contains(&LabelId::new("public", "B")));
        assert_eq!(catalog.edge_roles(&ab).len(), 2);
        assert_eq!(catalog.foreign_keys(), &catalog.rebuild_foreign_keys());
        assert!(events
            .iter()
            .all(|event| event.action == TopologyChangeAction::Create));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut once = Catalog::with_schema("public");
        once.apply(&ab_changes());
        let mut twice = once.clone();
        let events = twice.apply(&ab_changes());
        assert!(events.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_removing_edge_label_detaches_roles() {
        let mut catalog = Catalog::with_schema("public");
        catalog.apply(&ab_changes());
        let mut removal = ChangeSet::default();
        let mut schema = SchemaDelta::default();
        schema.removed_edge_labels.insert("ab".to_string());
        removal.schemas.insert("public".to_string(), schema);

        let events = catalog.apply(&removal);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, TopologyChangeAction::Delete);
        let a = catalog.vertex_label(&LabelId::new("public", "A")).unwrap();
        assert!(a.out_edge_roles().is_empty());
        assert!(catalog.foreign_keys().is_empty());
    }

    #[test]
    fn test_role_for_missing_edge_label_is_skipped() {
        let mut catalog = Catalog::with_schema("public");
        let mut changes = ab_changes();
        changes
            .schemas
            .get_mut("public")
            .unwrap()
            .edge_labels
            .clear();
        catalog.apply(&changes);
        let a = catalog.vertex_label(&LabelId::new("public", "A")).unwrap();
        assert!(a.out_edge_roles().is_empty());
    }
}
