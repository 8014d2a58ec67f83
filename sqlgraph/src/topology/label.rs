// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared label capability
//!
//! Vertex and edge labels both own property columns, indexes, partitions and
//! an ordered identifier list. That common state lives in [`LabelCore`] and
//! is exposed through the [`AbstractLabel`] trait.

use super::edge_label::EdgeLabel;
use super::editor::SchemaEditor;
use super::error::{TopologyError, TopologyResult};
use super::foreign_key::ForeignKey;
use super::property::{PropertyColumn, PropertyDefinition};
use super::vertex_label::VertexLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Table name prefix for vertex labels
pub const VERTEX_PREFIX: &str = "V_";
/// Table name prefix for edge labels
pub const EDGE_PREFIX: &str = "E_";
/// Surrogate identity column of labels without identifiers
pub const ID: &str = "ID";

/// Fully-qualified label name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId {
    pub schema: String,
    pub label: String,
}

impl LabelId {
    pub fn new(schema: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            label: label.into(),
        }
    }

    /// `schema.label`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.label)
    }

    pub(crate) fn renamed(&self, label: &str) -> Self {
        Self::new(self.schema.clone(), label)
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelKind {
    Vertex,
    Edge,
}

impl LabelKind {
    pub fn table_prefix(&self) -> &'static str {
        match self {
            LabelKind::Vertex => VERTEX_PREFIX,
            LabelKind::Edge => EDGE_PREFIX,
        }
    }

    pub fn table_name(&self, label: &str) -> String {
        format!("{}{}", self.table_prefix(), label)
    }
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKind::Vertex => write!(f, "vertex"),
            LabelKind::Edge => write!(f, "edge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Unique,
    NonUnique,
}

/// Index over one or more property columns of a label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: String,
    pub index_type: IndexType,
    pub properties: Vec<String>,
}

impl Index {
    /// Default physical name for an index on `table`
    pub fn name_for(table: &str, index_type: IndexType, properties: &[String]) -> String {
        let suffix = match index_type {
            IndexType::Unique => "uidx",
            IndexType::NonUnique => "idx",
        };
        format!("{}_{}_{}", table, properties.join("_"), suffix)
    }

    pub fn covers(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionType {
    #[default]
    None,
    Range,
    List,
}

impl PartitionType {
    pub fn is_none(&self) -> bool {
        matches!(self, PartitionType::None)
    }
}

/// A range or list partition of a partitioned label table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_values: Option<String>,
}

impl Partition {
    pub fn range(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: Some(from.into()),
            to: Some(to.into()),
            in_values: None,
        }
    }

    pub fn list(name: impl Into<String>, in_values: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: None,
            to: None,
            in_values: Some(in_values.into()),
        }
    }

    pub fn partition_type(&self) -> PartitionType {
        if self.in_values.is_some() {
            PartitionType::List
        } else {
            PartitionType::Range
        }
    }
}

/// State shared by vertex and edge labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCore {
    pub(crate) id: LabelId,
    pub(crate) identifiers: Vec<String>,
    pub(crate) properties: BTreeMap<String, PropertyColumn>,
    pub(crate) indexes: BTreeMap<String, Index>,
    pub(crate) partitions: BTreeMap<String, Partition>,
    pub(crate) partition_type: PartitionType,
    pub(crate) partition_expression: Option<String>,
    pub(crate) foreign: bool,
}

impl LabelCore {
    pub(crate) fn new(id: LabelId, identifiers: Vec<String>) -> Self {
        Self {
            id,
            identifiers,
            properties: BTreeMap::new(),
            indexes: BTreeMap::new(),
            partitions: BTreeMap::new(),
            partition_type: PartitionType::None,
            partition_expression: None,
            foreign: false,
        }
    }

    pub(crate) fn partitioned(mut self, partition_type: PartitionType, expression: Option<String>) -> Self {
        self.partition_type = partition_type;
        self.partition_expression = expression;
        self
    }

    /// Rename a property, keeping identifier order and index coverage
    pub(crate) fn rename_property(&mut self, old: &str, new: &str) {
        if let Some(column) = self.properties.remove(old) {
            self.properties.insert(new.to_string(), column.renamed(new));
        }
        for identifier in self.identifiers.iter_mut() {
            if identifier == old {
                *identifier = new.to_string();
            }
        }
        for index in self.indexes.values_mut() {
            for property in index.properties.iter_mut() {
                if property == old {
                    *property = new.to_string();
                }
            }
        }
    }
}

/// Capability shared by [`VertexLabel`] and [`EdgeLabel`]
pub trait AbstractLabel {
    fn core(&self) -> &LabelCore;

    fn kind(&self) -> LabelKind;

    fn id(&self) -> &LabelId {
        &self.core().id
    }

    fn schema_name(&self) -> &str {
        &self.core().id.schema
    }

    fn name(&self) -> &str {
        &self.core().id.label
    }

    fn full_name(&self) -> String {
        self.core().id.full_name()
    }

    /// Physical table name without the schema
    fn table_name(&self) -> String {
        self.kind().table_name(self.name())
    }

    fn properties(&self) -> &BTreeMap<String, PropertyColumn> {
        &self.core().properties
    }

    fn property(&self, name: &str) -> Option<&PropertyColumn> {
        self.core().properties.get(name)
    }

    /// Ordered identifier property names; empty means surrogate `ID`
    fn identifiers(&self) -> &[String] {
        &self.core().identifiers
    }

    fn has_identifiers(&self) -> bool {
        !self.core().identifiers.is_empty()
    }

    fn indexes(&self) -> &BTreeMap<String, Index> {
        &self.core().indexes
    }

    fn partitions(&self) -> &BTreeMap<String, Partition> {
        &self.core().partitions
    }

    fn partition_type(&self) -> PartitionType {
        self.core().partition_type
    }

    fn partition_expression(&self) -> Option<&str> {
        self.core().partition_expression.as_deref()
    }

    /// Imported from another topology and not writable
    fn is_foreign(&self) -> bool {
        self.core().foreign
    }
}

/// Either kind of label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Vertex(Arc<VertexLabel>),
    Edge(Arc<EdgeLabel>),
}

impl AbstractLabel for Label {
    fn core(&self) -> &LabelCore {
        match self {
            Label::Vertex(label) => label.core(),
            Label::Edge(label) => label.core(),
        }
    }

    fn kind(&self) -> LabelKind {
        match self {
            Label::Vertex(_) => LabelKind::Vertex,
            Label::Edge(_) => LabelKind::Edge,
        }
    }
}

impl SchemaEditor<'_> {
    /// Add the properties a label lacks. Existing properties must keep
    /// their base type; their definitions are left alone.
    pub(crate) fn ensure_properties_exist(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        properties: &BTreeMap<String, PropertyDefinition>,
    ) -> TopologyResult<()> {
        let label = self.label(kind, id)?;
        let mut missing = Vec::new();
        for (name, definition) in properties {
            match label.property(name) {
                Some(existing)
                    if !existing
                        .property_type()
                        .is_compatible_with(&definition.property_type) =>
                {
                    return Err(TopologyError::PropertyTypeConflict {
                        name: format!("{}.{}", id, name),
                        existing: existing.property_type(),
                        requested: definition.property_type,
                    });
                }
                Some(_) => {}
                None => missing.push((name, definition)),
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("{} label {}", kind, id)));
        }

        let table = label.table_name();
        for (name, definition) in missing {
            self.check_name(name)?;
            let column = self.dialect.column_definition(name, definition)?;
            self.execute(&self.dialect.add_column_statement(&id.schema, &table, &column))?;
            self.execute_all(self.dialect.constraint_statements(&id.schema, &table, name, definition)?)?;
            self.record(format!("add property {}.{}", id, name));
            self.core_mut(kind, id)?
                .properties
                .insert(name.clone(), PropertyColumn::new(name.clone(), definition.clone()));
        }
        Ok(())
    }

    /// Drop a property column, with the indexes covering it. With
    /// `preserve_data` the column stays in the table and only leaves the
    /// topology.
    pub(crate) fn remove_property(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        name: &str,
        preserve_data: bool,
    ) -> TopologyResult<()> {
        let label = self.writable_label(kind, id)?;
        let column = label
            .property(name)
            .cloned()
            .ok_or_else(|| TopologyError::PropertyNotFound(format!("{}.{}", id, name)))?;
        if label.identifiers().iter().any(|i| i == name) {
            return Err(TopologyError::IdentifierImmutable(format!("{}.{}", id, name)));
        }
        let table = label.table_name();
        let covering: Vec<Index> = label
            .indexes()
            .values()
            .filter(|index| index.covers(name))
            .cloned()
            .collect();
        for index in &covering {
            self.execute(&self.dialect.drop_index_statement(&id.schema, &index.name))?;
        }
        self.execute_all(self.dialect.drop_constraint_statements(
            &id.schema,
            &table,
            name,
            column.definition(),
        ))?;
        if !preserve_data {
            self.execute(&self.dialect.drop_column_statement(&id.schema, &table, name))?;
        }

        self.record(format!("remove property {}.{}", id, name));
        let core = self.core_mut(kind, id)?;
        core.properties.remove(name);
        for index in covering {
            core.indexes.remove(&index.name);
        }
        Ok(())
    }

    /// Rename a property column. Renaming an identifier of a vertex label
    /// also renames the foreign key columns edge tables hold for it.
    pub(crate) fn rename_property(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        old: &str,
        new: &str,
    ) -> TopologyResult<()> {
        let label = self.writable_label(kind, id)?;
        let column = label
            .property(old)
            .cloned()
            .ok_or_else(|| TopologyError::PropertyNotFound(format!("{}.{}", id, old)))?;
        if old == new {
            return Ok(());
        }
        if label.property(new).is_some() {
            return Err(TopologyError::AlreadyExists(format!("property {}.{}", id, new)));
        }
        self.check_name(new)?;
        let table = label.table_name();
        let definition = column.definition();
        self.execute_all(self.dialect.drop_constraint_statements(&id.schema, &table, old, definition))?;
        self.execute(&self.dialect.rename_column_statement(&id.schema, &table, old, new))?;
        self.execute_all(self.dialect.constraint_statements(&id.schema, &table, new, definition)?)?;

        let is_identifier = label.identifiers().iter().any(|i| i == old);
        if let (true, Label::Vertex(vertex)) = (is_identifier, &label) {
            let mut renamed = vertex.as_ref().clone();
            renamed.core.rename_property(old, new);
            for role in vertex.all_edge_roles() {
                let edge = role.edge_label();
                let before = ForeignKey::for_vertex(vertex, role.direction());
                let after = ForeignKey::for_vertex(&renamed, role.direction());
                let edge_table = LabelKind::Edge.table_name(&edge.label);
                for (from, to) in before.columns.iter().zip(&after.columns) {
                    if from != to {
                        self.execute(&self.dialect.rename_column_statement(
                            &edge.schema,
                            &edge_table,
                            from,
                            to,
                        ))?;
                    }
                }
            }
        }

        self.record(format!("rename property {}.{} to {}", id, old, new));
        self.core_mut(kind, id)?.rename_property(old, new);
        self.work.renames.record_property(kind, id, old, new);
        if is_identifier && kind == LabelKind::Vertex {
            self.catalog_mut().refresh_foreign_keys(id);
        }
        Ok(())
    }

    /// Get or create an index over `properties`
    pub(crate) fn ensure_index_exists(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        index_type: IndexType,
        properties: &[String],
    ) -> TopologyResult<Index> {
        let label = self.label(kind, id)?;
        if properties.is_empty() {
            return Err(TopologyError::InvalidArgument(format!(
                "an index on {} needs at least one property",
                id
            )));
        }
        for property in properties {
            if label.property(property).is_none() {
                return Err(TopologyError::PropertyNotFound(format!("{}.{}", id, property)));
            }
        }
        let table = label.table_name();
        let name = Index::name_for(&table, index_type, properties);
        if let Some(existing) = label.indexes().get(&name) {
            return Ok(existing.clone());
        }
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("{} label {}", kind, id)));
        }
        self.execute(&self.dialect.create_index_statement(
            &id.schema,
            &table,
            &name,
            properties,
            index_type == IndexType::Unique,
        ))?;
        let index = Index {
            name: name.clone(),
            index_type,
            properties: properties.to_vec(),
        };
        self.record(format!("create index {} on {}", name, id));
        self.core_mut(kind, id)?.indexes.insert(name, index.clone());
        Ok(index)
    }

    pub(crate) fn remove_index(&mut self, kind: LabelKind, id: &LabelId, name: &str) -> TopologyResult<()> {
        let label = self.writable_label(kind, id)?;
        if !label.indexes().contains_key(name) {
            return Err(TopologyError::InvalidArgument(format!(
                "{} has no index named {}",
                id, name
            )));
        }
        self.execute(&self.dialect.drop_index_statement(&id.schema, name))?;
        self.record(format!("remove index {} from {}", name, id));
        self.core_mut(kind, id)?.indexes.remove(name);
        Ok(())
    }

    /// Get or create a partition of a partitioned label
    pub(crate) fn ensure_partition_exists(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        partition: Partition,
    ) -> TopologyResult<Partition> {
        let label = self.label(kind, id)?;
        if let Some(existing) = label.partitions().get(&partition.name) {
            return Ok(existing.clone());
        }
        if !self.dialect.supports_partitioning() {
            return Err(TopologyError::NotSupported(format!(
                "{} does not support partitions",
                self.dialect.name()
            )));
        }
        if label.partition_type().is_none() {
            return Err(TopologyError::InvalidArgument(format!("{} is not partitioned", id)));
        }
        if label.partition_type() != partition.partition_type() {
            return Err(TopologyError::InvalidArgument(format!(
                "{} is {:?} partitioned, partition {} is not",
                id,
                label.partition_type(),
                partition.name
            )));
        }
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("{} label {}", kind, id)));
        }
        self.check_name(&partition.name)?;
        self.execute(&self.dialect.create_partition_statement(
            &id.schema,
            &label.table_name(),
            &partition,
        )?)?;
        self.record(format!("create partition {} of {}", partition.name, id));
        self.core_mut(kind, id)?
            .partitions
            .insert(partition.name.clone(), partition.clone());
        Ok(partition)
    }

    pub(crate) fn remove_partition(&mut self, kind: LabelKind, id: &LabelId, name: &str) -> TopologyResult<()> {
        let label = self.writable_label(kind, id)?;
        if !label.partitions().contains_key(name) {
            return Err(TopologyError::InvalidArgument(format!(
                "{} has no partition named {}",
                id, name
            )));
        }
        self.execute(&self.dialect.drop_partition_statement(&id.schema, name))?;
        self.record(format!("remove partition {} from {}", name, id));
        self.core_mut(kind, id)?.partitions.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::property::{PropertyDefinition, PropertyType};

    #[test]
    fn test_table_names() {
        assert_eq!(LabelKind::Vertex.table_name("Person"), "V_Person");
        assert_eq!(LabelKind::Edge.table_name("knows"), "E_knows");
        assert_eq!(LabelId::new("public", "Person").to_string(), "public.Person");
    }

    #[test]
    fn test_index_name() {
        let name = Index::name_for(
            "V_Person",
            IndexType::Unique,
            &["first".to_string(), "last".to_string()],
        );
        assert_eq!(name, "V_Person_first_last_uidx");
    }

    #[test]
    fn test_rename_property_updates_identifiers_and_indexes() {
        let mut core = LabelCore::new(LabelId::new("public", "A"), vec!["code".to_string()]);
        core.properties.insert(
            "code".to_string(),
            PropertyColumn::new("code", PropertyDefinition::of(PropertyType::String)),
        );
        core.indexes.insert(
            "idx".to_string(),
            Index {
                name: "idx".to_string(),
                index_type: IndexType::NonUnique,
                properties: vec!["code".to_string()],
            },
        );
        core.rename_property("code", "key");
        assert!(core.properties.contains_key("key"));
        assert_eq!(core.identifiers, vec!["key".to_string()]);
        assert!(core.indexes["idx"].covers("key"));
    }

    #[test]
    fn test_partition_type_is_derived() {
        assert_eq!(Partition::range("p1", "0", "10").partition_type(), PartitionType::Range);
        assert_eq!(Partition::list("p2", "'a','b'").partition_type(), PartitionType::List);
    }
}
