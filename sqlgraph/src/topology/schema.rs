// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schemas: namespaces of vertex and edge labels

use super::edge_label::EdgeLabel;
use super::edge_role::Direction;
use super::editor::SchemaEditor;
use super::error::{TopologyError, TopologyResult};
use super::label::{AbstractLabel, Label, LabelCore, LabelId, LabelKind, PartitionType, ID};
use super::multiplicity::EdgeDefinition;
use super::property::{PropertyColumn, PropertyDefinition};
use super::vertex_label::VertexLabel;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A namespace owning vertex and edge labels by local name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub(crate) name: String,
    pub(crate) foreign: bool,
    pub(crate) vertex_labels: BTreeMap<String, Arc<VertexLabel>>,
    pub(crate) edge_labels: BTreeMap<String, Arc<EdgeLabel>>,
}

impl Schema {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign: false,
            vertex_labels: BTreeMap::new(),
            edge_labels: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Imported from another topology and not writable
    pub fn is_foreign(&self) -> bool {
        self.foreign
    }

    pub fn vertex_label(&self, name: &str) -> Option<&Arc<VertexLabel>> {
        self.vertex_labels.get(name)
    }

    pub fn edge_label(&self, name: &str) -> Option<&Arc<EdgeLabel>> {
        self.edge_labels.get(name)
    }

    pub fn vertex_labels(&self) -> &BTreeMap<String, Arc<VertexLabel>> {
        &self.vertex_labels
    }

    pub fn edge_labels(&self) -> &BTreeMap<String, Arc<EdgeLabel>> {
        &self.edge_labels
    }

    pub fn label(&self, kind: LabelKind, name: &str) -> Option<Label> {
        match kind {
            LabelKind::Vertex => self.vertex_labels.get(name).cloned().map(Label::Vertex),
            LabelKind::Edge => self.edge_labels.get(name).cloned().map(Label::Edge),
        }
    }

    /// Every label in the schema, vertex labels first
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.vertex_labels
            .values()
            .cloned()
            .map(Label::Vertex)
            .chain(self.edge_labels.values().cloned().map(Label::Edge))
    }

    pub fn label_id(&self, name: &str) -> LabelId {
        LabelId::new(self.name.clone(), name)
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_labels.is_empty() && self.edge_labels.is_empty()
    }

    /// Read-only copy of this schema and every label in it
    pub(crate) fn as_foreign(&self) -> Schema {
        let mut schema = self.clone();
        schema.foreign = true;
        for label in schema.vertex_labels.values_mut() {
            Arc::make_mut(label).core.foreign = true;
        }
        for label in schema.edge_labels.values_mut() {
            Arc::make_mut(label).core.foreign = true;
        }
        schema
    }
}

/// Layout requested for a new label table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableLayout<'a> {
    pub(crate) identifiers: &'a [String],
    pub(crate) partition_type: PartitionType,
    pub(crate) partition_expression: Option<&'a str>,
}

impl<'a> TableLayout<'a> {
    pub(crate) fn with_identifiers(identifiers: &'a [String]) -> Self {
        Self {
            identifiers,
            partition_type: PartitionType::None,
            partition_expression: None,
        }
    }
}

impl SchemaEditor<'_> {
    /// Get or create a schema
    pub(crate) fn ensure_schema_exist(&mut self, name: &str) -> TopologyResult<Arc<Schema>> {
        if let Some(schema) = self.catalog().schema(name) {
            return Ok(Arc::clone(schema));
        }
        self.check_name(name)?;
        if let Some(sql) = self.dialect.create_schema_statement(name, false) {
            self.execute(&sql)?;
        }
        self.record(format!("create schema {}", name));
        self.catalog_mut().insert_schema(Schema::new(name));
        self.catalog()
            .schema(name)
            .cloned()
            .ok_or_else(|| TopologyError::SchemaNotFound(name.to_string()))
    }

    /// Get or create a vertex label. An existing label gains the properties
    /// it lacks; a property with a conflicting type is an error.
    pub(crate) fn ensure_vertex_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        properties: &BTreeMap<String, PropertyDefinition>,
        layout: TableLayout<'_>,
    ) -> TopologyResult<Arc<VertexLabel>> {
        let id = LabelId::new(schema, name);
        if self.catalog().vertex_label(&id).is_none() {
            if self.ensure_schema_exist(schema)?.is_foreign() {
                return Err(TopologyError::ReadOnly(format!("schema {}", schema)));
            }
            self.check_name(name)?;
            let core = self.create_label_table(LabelKind::Vertex, &id, properties, layout)?;
            self.record(format!("create vertex label {}", id));
            self.catalog_mut()
                .insert_vertex_label(VertexLabel::from_core(core));
        } else {
            self.ensure_properties_exist(LabelKind::Vertex, &id, properties)?;
        }
        self.vertex_label(&id)
    }

    /// Get or create an edge label between `out` and `in_`, adding the two
    /// edge roles when they are missing. An existing edge label becomes
    /// polymorphic when it gains roles for other vertex labels.
    pub(crate) fn ensure_edge_label_exist(
        &mut self,
        schema: &str,
        name: &str,
        out: &LabelId,
        in_: &LabelId,
        properties: &BTreeMap<String, PropertyDefinition>,
        layout: TableLayout<'_>,
        definition: EdgeDefinition,
    ) -> TopologyResult<Arc<EdgeLabel>> {
        self.vertex_label(out)?;
        self.vertex_label(in_)?;
        let id = LabelId::new(schema, name);
        if self.catalog().edge_label(&id).is_none() {
            if self.ensure_schema_exist(schema)?.is_foreign() {
                return Err(TopologyError::ReadOnly(format!("schema {}", schema)));
            }
            self.check_name(name)?;
            let core = self.create_label_table(LabelKind::Edge, &id, properties, layout)?;
            self.record(format!("create edge label {}", id));
            self.catalog_mut().insert_edge_label(EdgeLabel::from_core(core));
        } else {
            self.ensure_properties_exist(LabelKind::Edge, &id, properties)?;
        }
        self.ensure_edge_role(&id, out, Direction::Out, definition.out_multiplicity)?;
        self.ensure_edge_role(&id, in_, Direction::In, definition.in_multiplicity)?;
        self.edge_label(&id)
    }

    /// Drop every label of a schema, edge labels first, then the schema
    pub(crate) fn remove_schema(&mut self, name: &str) -> TopologyResult<()> {
        if name == self.config.default_schema {
            return Err(TopologyError::InvariantViolation(format!(
                "the default schema {} cannot be removed",
                name
            )));
        }
        let schema = self.writable_schema(name)?;
        for edge in schema.edge_labels().values() {
            if self.catalog().edge_label(edge.id()).is_some() {
                self.remove_edge_label(edge.id(), false)?;
            }
        }
        for vertex in schema.vertex_labels().values() {
            self.remove_vertex_label(vertex.id(), false)?;
        }
        if let Some(sql) = self.dialect.drop_schema_statement(name) {
            self.execute(&sql)?;
        }
        self.record(format!("remove schema {}", name));
        self.catalog_mut().remove_schema_entry(name);
        Ok(())
    }

    fn create_label_table(
        &self,
        kind: LabelKind,
        id: &LabelId,
        properties: &BTreeMap<String, PropertyDefinition>,
        layout: TableLayout<'_>,
    ) -> TopologyResult<LabelCore> {
        for property in properties.keys() {
            self.check_name(property)?;
        }
        for identifier in layout.identifiers {
            if !properties.contains_key(identifier) {
                return Err(TopologyError::InvalidArgument(format!(
                    "identifier {} is not a property of {}",
                    identifier, id
                )));
            }
        }
        if !layout.partition_type.is_none() {
            if !self.dialect.supports_partitioning() {
                return Err(TopologyError::NotSupported(format!(
                    "{} does not support partitioned labels",
                    self.dialect.name()
                )));
            }
            if layout.identifiers.is_empty() || layout.partition_expression.is_none() {
                return Err(TopologyError::InvalidArgument(format!(
                    "partitioned label {} needs identifiers and a partition expression",
                    id
                )));
            }
        }

        let table = kind.table_name(&id.label);
        let mut columns = Vec::with_capacity(properties.len() + 2);
        if layout.identifiers.is_empty() {
            columns.push(format!(
                "{} {}",
                self.quote(ID),
                self.dialect.auto_increment_primary_key_construct()
            ));
        }
        for (name, definition) in properties {
            columns.push(self.dialect.column_definition(name, definition)?);
        }
        if !layout.identifiers.is_empty() {
            let keys: Vec<String> = layout.identifiers.iter().map(|i| self.quote(i)).collect();
            columns.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        let mut sql = format!(
            "{}{} ({})",
            self.dialect.create_table_statement(),
            self.dialect.qualified_table(&id.schema, &table),
            columns.join(", ")
        );
        if let Some(expression) = layout.partition_expression {
            sql.push_str(&self.dialect.partition_clause(layout.partition_type, expression)?);
        }
        self.execute(&sql)?;
        for (name, definition) in properties {
            self.execute_all(self.dialect.constraint_statements(&id.schema, &table, name, definition)?)?;
        }

        let mut core = LabelCore::new(id.clone(), layout.identifiers.to_vec()).partitioned(
            layout.partition_type,
            layout.partition_expression.map(str::to_string),
        );
        for (name, definition) in properties {
            core.properties.insert(
                name.clone(),
                PropertyColumn::new(name.clone(), definition.clone()),
            );
        }
        Ok(core)
    }
}
