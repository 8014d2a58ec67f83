// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Edge labels

use super::edge_role::{Direction, EdgeRole};
use super::editor::SchemaEditor;
use super::error::{TopologyError, TopologyResult};
use super::label::{AbstractLabel, LabelCore, LabelId, LabelKind};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An edge type. Its table holds one foreign key column group per vertex
/// label taking part in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLabel {
    pub(crate) core: LabelCore,
    pub(crate) out_vertex_labels: BTreeSet<LabelId>,
    pub(crate) in_vertex_labels: BTreeSet<LabelId>,
}

impl EdgeLabel {
    pub(crate) fn from_core(core: LabelCore) -> Self {
        Self {
            core,
            out_vertex_labels: BTreeSet::new(),
            in_vertex_labels: BTreeSet::new(),
        }
    }

    /// Vertex labels with a role on the given side
    pub fn vertex_labels(&self, direction: Direction) -> &BTreeSet<LabelId> {
        match direction {
            Direction::Out => &self.out_vertex_labels,
            Direction::In => &self.in_vertex_labels,
        }
    }

    pub(crate) fn vertex_labels_mut(&mut self, direction: Direction) -> &mut BTreeSet<LabelId> {
        match direction {
            Direction::Out => &mut self.out_vertex_labels,
            Direction::In => &mut self.in_vertex_labels,
        }
    }

    pub fn out_vertex_labels(&self) -> &BTreeSet<LabelId> {
        &self.out_vertex_labels
    }

    pub fn in_vertex_labels(&self) -> &BTreeSet<LabelId> {
        &self.in_vertex_labels
    }

    pub(crate) fn core_mut(&mut self) -> &mut LabelCore {
        &mut self.core
    }

    /// Replace every back-reference to `old` with `new`
    pub(crate) fn replace_vertex_label(&mut self, old: &LabelId, new: &LabelId) {
        for set in [&mut self.out_vertex_labels, &mut self.in_vertex_labels] {
            if set.remove(old) {
                set.insert(new.clone());
            }
        }
    }
}

impl AbstractLabel for EdgeLabel {
    fn core(&self) -> &LabelCore {
        &self.core
    }

    fn kind(&self) -> LabelKind {
        LabelKind::Edge
    }
}

impl SchemaEditor<'_> {
    /// Drop an edge label and every role pointing at it
    pub(crate) fn remove_edge_label(&mut self, id: &LabelId, preserve_data: bool) -> TopologyResult<()> {
        let label = self.writable_edge_label(id)?;
        if !preserve_data {
            self.execute(&self.dialect.drop_table_statement(&id.schema, &label.table_name()))?;
        }
        self.record(format!("remove edge label {}", id));
        self.catalog_mut().remove_edge_label_entry(id);
        Ok(())
    }

    pub(crate) fn rename_edge_label(&mut self, id: &LabelId, name: &str) -> TopologyResult<Arc<EdgeLabel>> {
        let label = self.writable_edge_label(id)?;
        if label.name() == name {
            return Ok(label);
        }
        let new_id = id.renamed(name);
        if self.catalog().edge_label(&new_id).is_some() {
            return Err(TopologyError::AlreadyExists(format!("edge label {}", new_id)));
        }
        self.check_name(name)?;
        let roles: Vec<EdgeRole> = self.catalog().edge_roles(id);
        self.drop_role_indexes(id, None)?;

        let old_table = label.table_name();
        let new_table = LabelKind::Edge.table_name(name);
        for (column, property) in label.properties() {
            self.execute_all(self.dialect.drop_constraint_statements(
                &id.schema,
                &old_table,
                column,
                property.definition(),
            ))?;
        }
        self.execute(&self.dialect.rename_table(&id.schema, &old_table, &new_table))?;
        for (column, property) in label.properties() {
            self.execute_all(self.dialect.constraint_statements(
                &id.schema,
                &new_table,
                column,
                property.definition(),
            )?)?;
        }

        self.record(format!("rename edge label {} to {}", id, name));
        let mut core = label.core.clone();
        core.id = new_id.clone();
        let catalog = self.catalog_mut();
        catalog.remove_edge_label_entry(id);
        catalog.insert_edge_label(EdgeLabel::from_core(core));
        for role in roles {
            catalog.attach_role(role.with_edge_label(new_id.clone()));
        }
        self.work.renames.record_label(LabelKind::Edge, id, name);
        self.create_role_indexes(&new_id, None)?;
        self.edge_label(&new_id)
    }
}
