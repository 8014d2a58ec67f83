// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Foreign key cache for edge tables
//!
//! Every edge role gives its edge table one group of foreign key columns
//! pointing at the vertex label of the role. The cache maps each edge table
//! to its groups and is updated as roles come and go, so looking up the
//! columns of an edge table never needs a metadata scan.

use super::edge_role::{Direction, EdgeRole};
use super::label::{AbstractLabel, LabelId, EDGE_PREFIX};
use super::vertex_label::VertexLabel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Foreign key column group of one edge role
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKey {
    pub vertex_label: LabelId,
    pub direction: Direction,
    pub columns: Vec<String>,
}

impl ForeignKey {
    /// Columns an edge table holds for `vertex` on the given side.
    ///
    /// Surrogate-keyed vertices get `schema.label__O`, vertices with
    /// identifiers get one `schema.label.identifier__O` column per identifier.
    pub fn for_vertex(vertex: &VertexLabel, direction: Direction) -> Self {
        let suffix = direction.foreign_key_suffix();
        let full_name = vertex.full_name();
        let columns = if vertex.has_identifiers() {
            vertex
                .identifiers()
                .iter()
                .map(|identifier| format!("{}.{}{}", full_name, identifier, suffix))
                .collect()
        } else {
            vec![format!("{}{}", full_name, suffix)]
        };
        Self {
            vertex_label: vertex.id().clone(),
            direction,
            columns,
        }
    }

    /// Fully-qualified edge table name used as the cache key
    pub fn edge_table(edge_label: &LabelId) -> String {
        format!("{}.{}{}", edge_label.schema, EDGE_PREFIX, edge_label.label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyCache {
    tables: BTreeMap<String, BTreeSet<ForeignKey>>,
}

impl ForeignKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edge_label: &LabelId, foreign_key: ForeignKey) {
        self.tables
            .entry(ForeignKey::edge_table(edge_label))
            .or_default()
            .insert(foreign_key);
    }

    /// Remove every group of `vertex_label` on `direction` for the edge table
    pub fn remove(&mut self, edge_label: &LabelId, vertex_label: &LabelId, direction: Direction) {
        let table = ForeignKey::edge_table(edge_label);
        if let Some(keys) = self.tables.get_mut(&table) {
            keys.retain(|key| !(key.vertex_label == *vertex_label && key.direction == direction));
            if keys.is_empty() {
                self.tables.remove(&table);
            }
        }
    }

    pub fn remove_table(&mut self, edge_label: &LabelId) {
        self.tables.remove(&ForeignKey::edge_table(edge_label));
    }

    pub fn add_role(&mut self, role: &EdgeRole, vertex: &VertexLabel) {
        self.add(role.edge_label(), ForeignKey::for_vertex(vertex, role.direction()));
    }

    pub fn remove_role(&mut self, role: &EdgeRole) {
        self.remove(role.edge_label(), role.vertex_label(), role.direction());
    }

    /// Foreign key groups of a fully-qualified edge table (`schema.E_label`)
    pub fn get(&self, edge_table: &str) -> Option<&BTreeSet<ForeignKey>> {
        self.tables.get(edge_table)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &BTreeSet<ForeignKey>)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::label::LabelCore;
    use crate::topology::multiplicity::Multiplicity;

    fn vertex(label: &str, identifiers: &[&str]) -> VertexLabel {
        VertexLabel::from_core(LabelCore::new(
            LabelId::new("public", label),
            identifiers.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_surrogate_key_columns() {
        let key = ForeignKey::for_vertex(&vertex("A", &[]), Direction::Out);
        assert_eq!(key.columns, vec!["public.A__O".to_string()]);
    }

    #[test]
    fn test_identifier_columns() {
        let key = ForeignKey::for_vertex(&vertex("B", &["x", "y"]), Direction::In);
        assert_eq!(
            key.columns,
            vec!["public.B.x__I".to_string(), "public.B.y__I".to_string()]
        );
    }

    #[test]
    fn test_incremental_add_and_remove() {
        let a = vertex("A", &[]);
        let ab = LabelId::new("public", "ab");
        let role = EdgeRole::new(a.id().clone(), ab.clone(), Direction::Out, Multiplicity::many());
        let mut cache = ForeignKeyCache::new();
        cache.add_role(&role, &a);
        assert_eq!(cache.get("public.E_ab").map(|k| k.len()), Some(1));
        cache.remove_role(&role);
        assert!(cache.get("public.E_ab").is_none());
        assert!(cache.is_empty());
    }
}
