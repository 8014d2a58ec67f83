// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction handle
//!
//! Structural operations run through the transaction that owns the
//! database connection. The first one takes the topology's schema-change
//! gate and gives the transaction a private working catalog; the gate is
//! held until commit or rollback.

use super::state::{TransactionId, TransactionState, TransactionStatus};
use crate::sql::SqlConnection;
use crate::topology::catalog::Catalog;
use crate::topology::change_set::SchemaWork;
use crate::topology::editor::SchemaEditor;
use crate::topology::schema::TableLayout;
use crate::topology::{
    AbstractLabel, EdgeDefinition, EdgeLabel, EdgeRemoveType, EdgeRole, Index, IndexType,
    LabelId, Partition, PartitionType, PropertyColumn, PropertyDefinition, Schema, Topology,
    TopologyError, TopologyResult, VertexLabel,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Transaction {
    topology: Arc<Topology>,
    conn: Box<dyn SqlConnection>,
    state: TransactionState,
    work: Option<SchemaWork>,
    /// The database transaction has ended
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(topology: Arc<Topology>, conn: Box<dyn SqlConnection>, id: TransactionId) -> Self {
        Self {
            topology,
            conn,
            state: TransactionState::new(id),
            work: None,
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.state.id
    }

    pub fn status(&self) -> &TransactionStatus {
        &self.state.status
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Whether this transaction holds the schema-change gate
    pub fn is_schema_changed(&self) -> bool {
        self.work.is_some()
    }

    /// Take the schema-change gate now instead of at the first structural
    /// operation. Blocks while another transaction holds it.
    pub fn start_schema_change(&mut self) -> TopologyResult<()> {
        self.ensure_active()?;
        if self.work.is_none() {
            self.work = Some(self.topology.start_schema_change(self.state.id)?);
        }
        Ok(())
    }

    pub(crate) fn connection(&self) -> &dyn SqlConnection {
        self.conn.as_ref()
    }

    pub(crate) fn ensure_active(&self) -> TopologyResult<()> {
        match &self.state.status {
            TransactionStatus::Active => Ok(()),
            TransactionStatus::Failed(reason) => Err(TopologyError::TransactionClosed(format!(
                "{} failed: {}",
                self.state.id, reason
            ))),
            status => Err(TopologyError::TransactionClosed(format!(
                "{} is {:?}",
                self.state.id, status
            ))),
        }
    }

    /// Read the catalog as this transaction sees it
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> T {
        match &self.work {
            Some(work) => f(&work.working),
            None => f(&self.topology.snapshot()),
        }
    }

    fn structural<T>(
        &mut self,
        description: String,
        f: impl FnOnce(&mut SchemaEditor<'_>) -> TopologyResult<T>,
    ) -> TopologyResult<T> {
        self.start_schema_change()?;
        self.state.add_operation(description);
        let Self {
            topology,
            conn,
            work: Some(work),
            state,
            ..
        } = self
        else {
            return Err(TopologyError::InvariantViolation(
                "structural change without the schema-change gate".to_string(),
            ));
        };
        let mut editor = SchemaEditor::new(&**conn, topology.dialect(), topology.config(), work);
        let result = f(&mut editor);
        if let Err(err @ (TopologyError::Sql(_) | TopologyError::InvariantViolation(_))) = &result {
            log::warn!("Transaction {} aborted: {}", state.id, err);
            state.fail(err.to_string());
        }
        result
    }

    // ==================
    // Schemas
    // ==================

    pub fn ensure_schema_exist(&mut self, name: &str) -> TopologyResult<Arc<Schema>> {
        if let Some(schema) = self.schema(name) {
            return Ok(schema);
        }
        self.structural(format!("ensure schema {}", name), |editor| {
            editor.ensure_schema_exist(name)
        })
    }

    /// Drop a schema with all its labels
    pub fn remove_schema(&mut self, name: &str) -> TopologyResult<()> {
        self.structural(format!("remove schema {}", name), |editor| {
            editor.remove_schema(name)
        })
    }

    // ==================
    // Labels
    // ==================

    /// Get or create a vertex label keyed by a surrogate `ID`
    pub fn ensure_vertex_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        properties: BTreeMap<String, PropertyDefinition>,
    ) -> TopologyResult<Arc<VertexLabel>> {
        self.ensure_vertex_label_exist_with_identifiers(schema, name, properties, &[])
    }

    /// Get or create a vertex label whose primary key is `identifiers`
    pub fn ensure_vertex_label_exist_with_identifiers(
        &mut self,
        schema: &str,
        name: &str,
        properties: BTreeMap<String, PropertyDefinition>,
        identifiers: &[&str],
    ) -> TopologyResult<Arc<VertexLabel>> {
        let identifiers = owned(identifiers);
        self.ensure_vertex_label(schema, name, properties, TableLayout::with_identifiers(&identifiers))
    }

    /// Get or create a vertex label partitioned by `expression`
    pub fn ensure_partitioned_vertex_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        properties: BTreeMap<String, PropertyDefinition>,
        identifiers: &[&str],
        partition_type: PartitionType,
        expression: &str,
    ) -> TopologyResult<Arc<VertexLabel>> {
        let identifiers = owned(identifiers);
        let layout = TableLayout {
            identifiers: &identifiers,
            partition_type,
            partition_expression: Some(expression),
        };
        self.ensure_vertex_label(schema, name, properties, layout)
    }

    fn ensure_vertex_label(
        &mut self,
        schema: &str,
        name: &str,
        properties: BTreeMap<String, PropertyDefinition>,
        layout: TableLayout<'_>,
    ) -> TopologyResult<Arc<VertexLabel>> {
        let id = LabelId::new(schema, name);
        if let Some(existing) = self.vertex_label(&id) {
            if properties.keys().all(|name| existing.property(name).is_some()) {
                let conflict = properties.iter().find_map(|(name, definition)| {
                    existing
                        .property(name)
                        .filter(|column| !column.property_type().is_compatible_with(&definition.property_type))
                        .map(|column| (name, column.property_type(), definition.property_type))
                });
                return match conflict {
                    Some((name, existing, requested)) => Err(TopologyError::PropertyTypeConflict {
                        name: name.clone(),
                        existing,
                        requested,
                    }),
                    None => Ok(existing),
                };
            }
        }
        self.structural(format!("ensure vertex label {}", id), |editor| {
            editor.ensure_vertex_label_exist(schema, name, &properties, layout)
        })
    }

    /// Get or create a many-to-many edge label from `out` to `in_`
    pub fn ensure_edge_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        out: &LabelId,
        in_: &LabelId,
        properties: BTreeMap<String, PropertyDefinition>,
    ) -> TopologyResult<Arc<EdgeLabel>> {
        self.ensure_edge_label_exist_with(
            schema,
            name,
            out,
            in_,
            properties,
            &[],
            EdgeDefinition::many_to_many(),
        )
    }

    /// Get or create an edge label from `out` to `in_` with the
    /// multiplicities of `definition` on its two roles
    #[allow(clippy::too_many_arguments)]
    pub fn ensure_edge_label_exist_with(
        &mut self,
        schema: &str,
        name: &str,
        out: &LabelId,
        in_: &LabelId,
        properties: BTreeMap<String, PropertyDefinition>,
        identifiers: &[&str],
        definition: EdgeDefinition,
    ) -> TopologyResult<Arc<EdgeLabel>> {
        let identifiers = owned(identifiers);
        let layout = TableLayout::with_identifiers(&identifiers);
        self.structural(format!("ensure edge label {}.{}", schema, name), |editor| {
            editor.ensure_edge_label_exist(schema, name, out, in_, &properties, layout, definition)
        })
    }

    /// Get or create an edge label whose table is partitioned by `expression`
    #[allow(clippy::too_many_arguments)]
    pub fn ensure_partitioned_edge_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        out: &LabelId,
        in_: &LabelId,
        properties: BTreeMap<String, PropertyDefinition>,
        identifiers: &[&str],
        definition: EdgeDefinition,
        partition_type: PartitionType,
        expression: &str,
    ) -> TopologyResult<Arc<EdgeLabel>> {
        let identifiers = owned(identifiers);
        let layout = TableLayout {
            identifiers: &identifiers,
            partition_type,
            partition_expression: Some(expression),
        };
        self.structural(format!("ensure edge label {}.{}", schema, name), |editor| {
            editor.ensure_edge_label_exist(schema, name, out, in_, &properties, layout, definition)
        })
    }

    /// Drop a vertex label and every edge role it takes part in. With
    /// `preserve_data` the tables and columns stay in the database.
    pub fn remove_vertex_label(&mut self, id: &LabelId, preserve_data: bool) -> TopologyResult<()> {
        self.structural(format!("remove vertex label {}", id), |editor| {
            editor.remove_vertex_label(id, preserve_data)
        })
    }

    pub fn remove_edge_label(&mut self, id: &LabelId, preserve_data: bool) -> TopologyResult<()> {
        self.structural(format!("remove edge label {}", id), |editor| {
            editor.remove_edge_label(id, preserve_data)
        })
    }

    pub fn rename_vertex_label(&mut self, id: &LabelId, name: &str) -> TopologyResult<Arc<VertexLabel>> {
        self.structural(format!("rename vertex label {} to {}", id, name), |editor| {
            editor.rename_vertex_label(id, name)
        })
    }

    pub fn rename_edge_label(&mut self, id: &LabelId, name: &str) -> TopologyResult<Arc<EdgeLabel>> {
        self.structural(format!("rename edge label {} to {}", id, name), |editor| {
            editor.rename_edge_label(id, name)
        })
    }

    /// Detach a vertex label from an edge label
    ///
    /// # Arguments
    /// * `role` - The role to remove, as found on the vertex label
    /// * `drop_edges` - Delete the edges stored through this role first
    /// * `preserve_data` - Keep the foreign key columns in the edge table
    ///
    /// # Returns
    /// * `EdgeRemoveType::EdgeLabel` when the edge label had no other
    ///   vertex label on that side and was removed too
    pub fn remove_edge_role(
        &mut self,
        role: &EdgeRole,
        drop_edges: bool,
        preserve_data: bool,
    ) -> TopologyResult<EdgeRemoveType> {
        self.structural(format!("remove edge role {}", role.name()), |editor| {
            editor.remove_edge_role(role, drop_edges, preserve_data)
        })
    }

    // ==================
    // Properties
    // ==================

    /// Add the properties `label` lacks
    pub fn ensure_properties_exist<L>(
        &mut self,
        label: &L,
        properties: BTreeMap<String, PropertyDefinition>,
    ) -> TopologyResult<()>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("ensure properties of {}", id), |editor| {
            editor.ensure_properties_exist(kind, &id, &properties)
        })
    }

    pub fn remove_property<L>(&mut self, label: &L, name: &str, preserve_data: bool) -> TopologyResult<()>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("remove property {}.{}", id, name), |editor| {
            editor.remove_property(kind, &id, name, preserve_data)
        })
    }

    pub fn rename_property<L>(&mut self, label: &L, old: &str, new: &str) -> TopologyResult<()>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("rename property {}.{} to {}", id, old, new), |editor| {
            editor.rename_property(kind, &id, old, new)
        })
    }

    /// Replace the multiplicity, default and check constraint of a property
    pub fn update_property_definition<L>(
        &mut self,
        label: &L,
        name: &str,
        definition: PropertyDefinition,
    ) -> TopologyResult<PropertyColumn>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("update property {}.{}", id, name), |editor| {
            editor.update_property_definition(kind, &id, name, definition)
        })
    }

    // ==================
    // Indexes and partitions
    // ==================

    pub fn ensure_index_exists<L>(
        &mut self,
        label: &L,
        index_type: IndexType,
        properties: &[&str],
    ) -> TopologyResult<Index>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        let properties = owned(properties);
        self.structural(format!("ensure index on {}", id), |editor| {
            editor.ensure_index_exists(kind, &id, index_type, &properties)
        })
    }

    pub fn remove_index<L>(&mut self, label: &L, name: &str) -> TopologyResult<()>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("remove index {} of {}", name, id), |editor| {
            editor.remove_index(kind, &id, name)
        })
    }

    /// Get or create the range partition `[from, to)` of a range
    /// partitioned label
    pub fn ensure_range_partition_exists<L>(
        &mut self,
        label: &L,
        name: &str,
        from: &str,
        to: &str,
    ) -> TopologyResult<Partition>
    where
        L: AbstractLabel + ?Sized,
    {
        self.ensure_partition(label, Partition::range(name, from, to))
    }

    /// Get or create a list partition of a list partitioned label
    pub fn ensure_list_partition_exists<L>(
        &mut self,
        label: &L,
        name: &str,
        in_values: &str,
    ) -> TopologyResult<Partition>
    where
        L: AbstractLabel + ?Sized,
    {
        self.ensure_partition(label, Partition::list(name, in_values))
    }

    fn ensure_partition<L>(&mut self, label: &L, partition: Partition) -> TopologyResult<Partition>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("ensure partition {} of {}", partition.name, id), |editor| {
            editor.ensure_partition_exists(kind, &id, partition)
        })
    }

    pub fn remove_partition<L>(&mut self, label: &L, name: &str) -> TopologyResult<()>
    where
        L: AbstractLabel + ?Sized,
    {
        let (kind, id) = (label.kind(), label.id().clone());
        self.structural(format!("remove partition {} of {}", name, id), |editor| {
            editor.remove_partition(kind, &id, name)
        })
    }

    // ==================
    // Reads
    // ==================

    pub fn schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.read(|catalog| catalog.schema(name).cloned())
    }

    pub fn schemas(&self) -> Vec<Arc<Schema>> {
        self.read(|catalog| catalog.schemas().values().cloned().collect())
    }

    pub fn vertex_label(&self, id: &LabelId) -> Option<Arc<VertexLabel>> {
        self.read(|catalog| catalog.vertex_label(id).cloned())
    }

    pub fn edge_label(&self, id: &LabelId) -> Option<Arc<EdgeLabel>> {
        self.read(|catalog| catalog.edge_label(id).cloned())
    }

    /// Every role attached to an edge label
    pub fn edge_roles(&self, edge_label: &LabelId) -> Vec<EdgeRole> {
        self.read(|catalog| catalog.edge_roles(edge_label))
    }

    // ==================
    // Completion
    // ==================

    /// Commit the database transaction and publish its structural changes.
    ///
    /// Listener and publish failures are reported after the commit took
    /// effect; the transaction still counts as committed.
    pub fn commit(mut self) -> TopologyResult<()> {
        if let Err(err) = self.ensure_active() {
            self.finish_with_rollback();
            return Err(err);
        }
        let work = self.work.take();
        self.finished = true;
        let result = self
            .topology
            .commit_transaction(self.state.id, self.conn.as_ref(), work);
        match &result {
            Ok(()) | Err(TopologyError::ListenerFailed(_)) | Err(TopologyError::NotificationFailed(_)) => {
                self.state.commit()
            }
            Err(err) => self.state.fail(err.to_string()),
        }
        result
    }

    /// Roll back the database transaction, discarding its structural changes
    pub fn rollback(mut self) -> TopologyResult<()> {
        let had_schema_work = self.work.take().is_some();
        self.finished = true;
        self.state.rollback();
        self.topology
            .rollback_transaction(self.state.id, self.conn.as_ref(), had_schema_work)
    }

    fn finish_with_rollback(&mut self) {
        if self.finished {
            return;
        }
        let had_schema_work = self.work.take().is_some();
        self.finished = true;
        if let Err(err) =
            self.topology
                .rollback_transaction(self.state.id, self.conn.as_ref(), had_schema_work)
        {
            log::warn!("Rollback of {} failed: {}", self.state.id, err);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            log::debug!("Transaction {} dropped without commit, rolling back", self.state.id);
            self.finish_with_rollback();
            if self.state.is_active() {
                self.state.rollback();
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.state.id)
            .field("status", &self.state.status)
            .field("schema_changed", &self.is_schema_changed())
            .finish()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
