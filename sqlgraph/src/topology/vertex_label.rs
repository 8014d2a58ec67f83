// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Vertex labels and their edge roles

use super::edge_role::{Direction, EdgeRemoveType, EdgeRole};
use super::editor::SchemaEditor;
use super::error::{TopologyError, TopologyResult};
use super::foreign_key::ForeignKey;
use super::label::{AbstractLabel, LabelCore, LabelId, LabelKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A vertex type. Owns the roles it plays in edge labels, keyed by the
/// edge label id, one map per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLabel {
    pub(crate) core: LabelCore,
    pub(crate) out_edge_roles: BTreeMap<LabelId, EdgeRole>,
    pub(crate) in_edge_roles: BTreeMap<LabelId, EdgeRole>,
}

impl VertexLabel {
    pub(crate) fn from_core(core: LabelCore) -> Self {
        Self {
            core,
            out_edge_roles: BTreeMap::new(),
            in_edge_roles: BTreeMap::new(),
        }
    }

    pub fn edge_roles(&self, direction: Direction) -> &BTreeMap<LabelId, EdgeRole> {
        match direction {
            Direction::Out => &self.out_edge_roles,
            Direction::In => &self.in_edge_roles,
        }
    }

    pub(crate) fn edge_roles_mut(&mut self, direction: Direction) -> &mut BTreeMap<LabelId, EdgeRole> {
        match direction {
            Direction::Out => &mut self.out_edge_roles,
            Direction::In => &mut self.in_edge_roles,
        }
    }

    pub fn out_edge_roles(&self) -> &BTreeMap<LabelId, EdgeRole> {
        &self.out_edge_roles
    }

    pub fn in_edge_roles(&self) -> &BTreeMap<LabelId, EdgeRole> {
        &self.in_edge_roles
    }

    pub fn edge_role(&self, direction: Direction, edge_label: &LabelId) -> Option<&EdgeRole> {
        self.edge_roles(direction).get(edge_label)
    }

    /// Every role of this label, out roles first
    pub fn all_edge_roles(&self) -> impl Iterator<Item = &EdgeRole> {
        self.out_edge_roles.values().chain(self.in_edge_roles.values())
    }

    pub(crate) fn core_mut(&mut self) -> &mut LabelCore {
        &mut self.core
    }

    /// Copy of this label under a new name, roles pointing at the new id
    pub(crate) fn renamed(&self, name: &str) -> Self {
        let id = self.core.id.renamed(name);
        let rekey = |roles: &BTreeMap<LabelId, EdgeRole>| {
            roles
                .iter()
                .map(|(edge, role)| (edge.clone(), role.with_vertex_label(id.clone())))
                .collect()
        };
        let mut core = self.core.clone();
        core.id = id.clone();
        Self {
            core,
            out_edge_roles: rekey(&self.out_edge_roles),
            in_edge_roles: rekey(&self.in_edge_roles),
        }
    }

    /// Re-key roles that point at edge label `old` so they point at `new`
    pub(crate) fn replace_edge_label(&mut self, old: &LabelId, new: &LabelId) {
        for roles in [&mut self.out_edge_roles, &mut self.in_edge_roles] {
            if let Some(role) = roles.remove(old) {
                roles.insert(new.clone(), role.with_edge_label(new.clone()));
            }
        }
    }
}

impl AbstractLabel for VertexLabel {
    fn core(&self) -> &LabelCore {
        &self.core
    }

    fn kind(&self) -> LabelKind {
        LabelKind::Vertex
    }
}

impl SchemaEditor<'_> {
    /// Detach a vertex label from an edge label.
    ///
    /// When the vertex label is the only one on that side of the edge label,
    /// the edge label itself goes away. Otherwise the role's foreign key
    /// columns are dropped (kept with `preserve_data`), after deleting the
    /// edges using them when `drop_edges` is set.
    pub(crate) fn remove_edge_role(
        &mut self,
        role: &EdgeRole,
        drop_edges: bool,
        preserve_data: bool,
    ) -> TopologyResult<EdgeRemoveType> {
        let (vertex, edge, direction) = (role.vertex_label(), role.edge_label(), role.direction());
        let vertex_label = self.writable_vertex_label(vertex)?;
        if vertex_label.edge_role(direction, edge).is_none() {
            return Err(TopologyError::EdgeRoleNotFound(role.name()));
        }
        let edge_label = self.writable_edge_label(edge)?;
        if edge_label.vertex_labels(direction).len() == 1 {
            self.remove_edge_label(edge, preserve_data)?;
            return Ok(EdgeRemoveType::EdgeLabel);
        }

        let table = edge_label.table_name();
        let foreign_key = ForeignKey::for_vertex(&vertex_label, direction);
        self.drop_role_indexes(edge, Some(vertex))?;
        if drop_edges {
            let condition = foreign_key
                .columns
                .iter()
                .map(|column| format!("{} IS NOT NULL", self.quote(column)))
                .collect::<Vec<_>>()
                .join(" AND ");
            self.execute(&format!(
                "DELETE FROM {} WHERE {}",
                self.dialect.qualified_table(&edge.schema, &table),
                condition
            ))?;
        }
        if !preserve_data {
            for column in &foreign_key.columns {
                self.execute(&self.dialect.drop_column_statement(&edge.schema, &table, column))?;
            }
        }

        self.record(format!("remove edge role {}", role.name()));
        self.catalog_mut().detach_role(vertex, edge, direction);
        Ok(EdgeRemoveType::EdgeRole)
    }

    /// Drop a vertex label together with its roles. Edge labels left
    /// without a vertex label on one side are dropped too.
    pub(crate) fn remove_vertex_label(&mut self, id: &LabelId, preserve_data: bool) -> TopologyResult<()> {
        let label = self.writable_vertex_label(id)?;
        for role in label.all_edge_roles() {
            let attached = self
                .catalog()
                .vertex_label(id)
                .is_some_and(|current| current.edge_role(role.direction(), role.edge_label()).is_some());
            if attached {
                self.remove_edge_role(role, true, preserve_data)?;
            }
        }
        if !preserve_data {
            self.execute(&self.dialect.drop_table_statement(&id.schema, &label.table_name()))?;
        }
        self.record(format!("remove vertex label {}", id));
        self.catalog_mut().remove_vertex_label_entry(id);
        Ok(())
    }

    /// Rename a vertex label: its table, and the foreign key columns every
    /// edge table holds for it.
    pub(crate) fn rename_vertex_label(&mut self, id: &LabelId, name: &str) -> TopologyResult<Arc<VertexLabel>> {
        let label = self.writable_vertex_label(id)?;
        if label.name() == name {
            return Ok(label);
        }
        let new_id = id.renamed(name);
        if self.catalog().vertex_label(&new_id).is_some() {
            return Err(TopologyError::AlreadyExists(format!("vertex label {}", new_id)));
        }
        self.check_name(name)?;
        let renamed = label.renamed(name);
        let edges: BTreeSet<LabelId> = label
            .all_edge_roles()
            .map(|role| role.edge_label().clone())
            .collect();
        for edge in &edges {
            self.drop_role_indexes(edge, Some(id))?;
        }

        let (old_table, new_table) = (label.table_name(), renamed.table_name());
        for (column, property) in label.properties() {
            self.execute_all(self.dialect.drop_constraint_statements(
                &id.schema,
                &old_table,
                column,
                property.definition(),
            ))?;
        }
        self.execute(&self.dialect.rename_table(&id.schema, &old_table, &new_table))?;
        for (column, property) in renamed.properties() {
            self.execute_all(self.dialect.constraint_statements(
                &id.schema,
                &new_table,
                column,
                property.definition(),
            )?)?;
        }
        for role in label.all_edge_roles() {
            let edge = role.edge_label();
            let edge_table = LabelKind::Edge.table_name(&edge.label);
            let before = ForeignKey::for_vertex(&label, role.direction());
            let after = ForeignKey::for_vertex(&renamed, role.direction());
            for (from, to) in before.columns.iter().zip(&after.columns) {
                self.execute(&self.dialect.rename_column_statement(&edge.schema, &edge_table, from, to))?;
            }
        }

        self.record(format!("rename vertex label {} to {}", id, name));
        let roles: Vec<EdgeRole> = renamed.all_edge_roles().cloned().collect();
        let catalog = self.catalog_mut();
        catalog.remove_vertex_label_entry(id);
        catalog.insert_vertex_label(renamed);
        for role in roles {
            catalog.attach_role(role);
        }
        self.work.renames.record_label(LabelKind::Vertex, id, name);
        for edge in &edges {
            self.create_role_indexes(edge, Some(&new_id))?;
        }
        self.vertex_label(&new_id)
    }
}
