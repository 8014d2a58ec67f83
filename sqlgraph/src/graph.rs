// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Minimal graph data access
//!
//! Just enough DML to put vertices and edges into the tables the topology
//! created, so that the constraints derived from multiplicities are
//! enforced by the database on real rows.

use crate::sql::SqlValue;
use crate::topology::{
    AbstractLabel, Direction, EdgeLabel, ForeignKey, LabelId, TopologyError, TopologyResult,
    VertexLabel,
};
use crate::txn::Transaction;
use std::sync::Arc;

/// Key of a stored vertex: its identifier values, or the surrogate `ID`
#[derive(Debug, Clone, PartialEq)]
pub struct VertexRef {
    pub label: LabelId,
    pub key: Vec<(String, SqlValue)>,
}

impl VertexRef {
    /// Reference to a surrogate-keyed vertex
    pub fn with_id(label: LabelId, id: i64) -> Self {
        Self {
            label,
            key: vec![("ID".to_string(), SqlValue::Integer(id))],
        }
    }

    pub fn key_values(&self) -> Vec<SqlValue> {
        self.key.iter().map(|(_, value)| value.clone()).collect()
    }
}

impl Transaction {
    /// Insert a vertex and return its key
    pub fn add_vertex(&mut self, label: &LabelId, values: &[(&str, SqlValue)]) -> TopologyResult<VertexRef> {
        self.ensure_active()?;
        let vertex = self.required_vertex_label(label)?;
        self.check_columns(vertex.as_ref(), values)?;

        let table = self
            .topology()
            .dialect()
            .qualified_table(&label.schema, &vertex.table_name());
        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let params: Vec<SqlValue> = values.iter().map(|(_, value)| value.clone()).collect();
        self.insert(&table, &columns, &params)?;

        if !vertex.has_identifiers() {
            let id = self.connection().last_insert_id()?;
            return Ok(VertexRef::with_id(label.clone(), id));
        }
        let key = vertex
            .identifiers()
            .iter()
            .map(|identifier| {
                values
                    .iter()
                    .find(|(name, _)| *name == identifier.as_str())
                    .map(|(_, value)| (identifier.clone(), value.clone()))
                    .ok_or_else(|| {
                        TopologyError::InvalidArgument(format!(
                            "identifier {} of {} has no value",
                            identifier, label
                        ))
                    })
            })
            .collect::<TopologyResult<Vec<_>>>()?;
        Ok(VertexRef {
            label: label.clone(),
            key,
        })
    }

    /// Insert an edge from `out` to `in_` and return its row id
    pub fn add_edge(
        &mut self,
        edge: &LabelId,
        out: &VertexRef,
        in_: &VertexRef,
        values: &[(&str, SqlValue)],
    ) -> TopologyResult<i64> {
        self.ensure_active()?;
        let edge_label = self.required_edge_label(edge)?;
        self.check_columns(edge_label.as_ref(), values)?;
        let out_key = self.role_key(edge, out, Direction::Out)?;
        let in_key = self.role_key(edge, in_, Direction::In)?;

        let mut columns: Vec<&str> = Vec::new();
        let mut params = Vec::new();
        for (key, vertex) in [(&out_key, out), (&in_key, in_)] {
            columns.extend(key.columns.iter().map(String::as_str));
            params.extend(vertex.key_values());
        }
        for (name, value) in values {
            columns.push(*name);
            params.push(value.clone());
        }
        let table = self
            .topology()
            .dialect()
            .qualified_table(&edge.schema, &edge_label.table_name());
        self.insert(&table, &columns, &params)?;
        Ok(self.connection().last_insert_id()?)
    }

    /// Number of `edge` edges leaving `out`
    pub fn out_edge_count(&self, edge: &LabelId, out: &VertexRef) -> TopologyResult<i64> {
        self.ensure_active()?;
        let edge_label = self.required_edge_label(edge)?;
        let key = self.role_key(edge, out, Direction::Out)?;
        let dialect = self.topology().dialect();
        let conditions: Vec<String> = key
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                format!("{} = {}", dialect.maybe_wrap_in_quotes(column), dialect.placeholder(i + 1))
            })
            .collect();
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            dialect.qualified_table(&edge.schema, &edge_label.table_name()),
            conditions.join(" AND ")
        );
        log::debug!("{}", sql);
        let rows = self.connection().query(&sql, &out.key_values())?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .unwrap_or(0))
    }

    fn required_vertex_label(&self, id: &LabelId) -> TopologyResult<Arc<VertexLabel>> {
        self.vertex_label(id)
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    fn required_edge_label(&self, id: &LabelId) -> TopologyResult<Arc<EdgeLabel>> {
        self.edge_label(id)
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    fn check_columns<L: AbstractLabel + ?Sized>(
        &self,
        label: &L,
        values: &[(&str, SqlValue)],
    ) -> TopologyResult<()> {
        match values.iter().find(|(name, _)| label.property(name).is_none()) {
            Some((name, _)) => Err(TopologyError::PropertyNotFound(format!(
                "{}.{}",
                label.full_name(),
                name
            ))),
            None => Ok(()),
        }
    }

    /// Foreign key columns of the role `vertex` plays in `edge`
    fn role_key(&self, edge: &LabelId, vertex: &VertexRef, direction: Direction) -> TopologyResult<ForeignKey> {
        let vertex_label = self.required_vertex_label(&vertex.label)?;
        if vertex_label.edge_role(direction, edge).is_none() {
            return Err(TopologyError::EdgeRoleNotFound(format!(
                "{} {} {}",
                vertex.label, direction, edge
            )));
        }
        let key = ForeignKey::for_vertex(&vertex_label, direction);
        if key.columns.len() != vertex.key.len() {
            return Err(TopologyError::InvalidArgument(format!(
                "{} has {} key column(s), got {}",
                vertex.label,
                key.columns.len(),
                vertex.key.len()
            )));
        }
        Ok(key)
    }

    fn insert(&self, table: &str, columns: &[&str], params: &[SqlValue]) -> TopologyResult<()> {
        let dialect = self.topology().dialect();
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let names: Vec<String> = columns
                .iter()
                .map(|column| dialect.maybe_wrap_in_quotes(column))
                .collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| dialect.placeholder(i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                names.join(", "),
                placeholders.join(", ")
            )
        };
        log::debug!("{}", sql);
        self.connection().execute(&sql, params)?;
        Ok(())
    }
}
