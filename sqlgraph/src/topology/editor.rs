// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Structural editing of a transaction's working catalog
//!
//! A [`SchemaEditor`] pairs the transaction's connection with its private
//! working catalog. Every operation issues its DDL first and records the
//! change in the working copy only once the statements succeeded. The
//! operations themselves live next to the entity they change: schema
//! operations in `schema.rs`, shared label operations in `label.rs`, and so
//! on.

use super::catalog::Catalog;
use super::change_set::SchemaWork;
use super::edge_label::EdgeLabel;
use super::edge_role::{Direction, EdgeRole};
use super::error::{TopologyError, TopologyResult};
use super::foreign_key::ForeignKey;
use super::label::{AbstractLabel, Label, LabelCore, LabelId, LabelKind, EDGE_PREFIX, ID};
use super::multiplicity::Multiplicity;
use super::schema::Schema;
use super::vertex_label::VertexLabel;
use crate::config::TopologyConfig;
use crate::sql::{SqlConnection, SqlDialect};
use std::sync::Arc;

pub(crate) struct SchemaEditor<'a> {
    conn: &'a dyn SqlConnection,
    pub(crate) dialect: &'a dyn SqlDialect,
    pub(crate) config: &'a TopologyConfig,
    pub(crate) work: &'a mut SchemaWork,
}

/// An index the topology maintains on an edge table for its roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoleIndex {
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
    pub(crate) unique: bool,
    pub(crate) vertices: Vec<LabelId>,
}

impl<'a> SchemaEditor<'a> {
    pub(crate) fn new(
        conn: &'a dyn SqlConnection,
        dialect: &'a dyn SqlDialect,
        config: &'a TopologyConfig,
        work: &'a mut SchemaWork,
    ) -> Self {
        Self {
            conn,
            dialect,
            config,
            work,
        }
    }

    pub(crate) fn execute(&self, sql: &str) -> TopologyResult<()> {
        let statement = if self.dialect.needs_semicolon() {
            format!("{};", sql)
        } else {
            sql.to_string()
        };
        log::debug!("{}", statement);
        self.conn.execute(&statement, &[])?;
        Ok(())
    }

    pub(crate) fn execute_all<I>(&self, statements: I) -> TopologyResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        for statement in statements {
            self.execute(&statement)?;
        }
        Ok(())
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.work.working
    }

    pub(crate) fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.work.working
    }

    pub(crate) fn quote(&self, identifier: &str) -> String {
        self.dialect.maybe_wrap_in_quotes(identifier)
    }

    /// Validate a schema, label, property or partition name
    pub(crate) fn check_name(&self, name: &str) -> TopologyResult<()> {
        if name == ID {
            return Err(TopologyError::InvalidColumnName(format!(
                "{} is reserved",
                ID
            )));
        }
        self.dialect
            .validate_column_name(name, self.config.max_identifier_length)
            .map_err(TopologyError::InvalidColumnName)
    }

    pub(crate) fn writable_schema(&self, name: &str) -> TopologyResult<Arc<Schema>> {
        let schema = self
            .catalog()
            .schema(name)
            .cloned()
            .ok_or_else(|| TopologyError::SchemaNotFound(name.to_string()))?;
        if schema.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("schema {}", name)));
        }
        Ok(schema)
    }

    pub(crate) fn label(&self, kind: LabelKind, id: &LabelId) -> TopologyResult<Label> {
        self.catalog()
            .label(kind, id)
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    pub(crate) fn writable_label(&self, kind: LabelKind, id: &LabelId) -> TopologyResult<Label> {
        let label = self.label(kind, id)?;
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("{} label {}", kind, id)));
        }
        Ok(label)
    }

    pub(crate) fn vertex_label(&self, id: &LabelId) -> TopologyResult<Arc<VertexLabel>> {
        self.catalog()
            .vertex_label(id)
            .cloned()
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    pub(crate) fn edge_label(&self, id: &LabelId) -> TopologyResult<Arc<EdgeLabel>> {
        self.catalog()
            .edge_label(id)
            .cloned()
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    pub(crate) fn writable_vertex_label(&self, id: &LabelId) -> TopologyResult<Arc<VertexLabel>> {
        let label = self.vertex_label(id)?;
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("vertex label {}", id)));
        }
        Ok(label)
    }

    pub(crate) fn writable_edge_label(&self, id: &LabelId) -> TopologyResult<Arc<EdgeLabel>> {
        let label = self.edge_label(id)?;
        if label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("edge label {}", id)));
        }
        Ok(label)
    }

    pub(crate) fn core_mut(&mut self, kind: LabelKind, id: &LabelId) -> TopologyResult<&mut LabelCore> {
        self.work
            .working
            .label_core_mut(kind, id)
            .ok_or_else(|| TopologyError::LabelNotFound(id.to_string()))
    }

    pub(crate) fn record(&self, description: impl AsRef<str>) {
        log::debug!("Structural change: {}", description.as_ref());
    }

    /// Role indexes and pair indexes the topology keeps on an edge table.
    ///
    /// Every role gets an index on its foreign key columns, unique when the
    /// role allows at most one edge per vertex. A pair of many-valued roles
    /// where either side is `unique` also gets a unique index over both
    /// column groups.
    pub(crate) fn role_indexes(&self, edge: &LabelId) -> Vec<RoleIndex> {
        let catalog = self.catalog();
        let roles = catalog.edge_roles(edge);
        let key = |role: &EdgeRole| catalog.foreign_key(role);
        let mut indexes = Vec::new();
        for role in &roles {
            if let Some(foreign_key) = key(role) {
                indexes.push(RoleIndex {
                    name: role_index_name(edge, role.vertex_label(), role.direction()),
                    columns: foreign_key.columns,
                    unique: role.multiplicity().upper() == 1,
                    vertices: vec![role.vertex_label().clone()],
                });
            }
        }
        let outs = roles.iter().filter(|role| role.direction() == Direction::Out);
        for out in outs {
            for inn in roles.iter().filter(|role| role.direction() == Direction::In) {
                if !needs_pair_index(out, inn) {
                    continue;
                }
                let (Some(out_key), Some(in_key)) = (key(out), key(inn)) else {
                    continue;
                };
                indexes.push(RoleIndex {
                    name: pair_index_name(edge, out.vertex_label(), inn.vertex_label()),
                    columns: out_key.columns.into_iter().chain(in_key.columns).collect(),
                    unique: true,
                    vertices: vec![out.vertex_label().clone(), inn.vertex_label().clone()],
                });
            }
        }
        indexes
    }

    /// Drop the role indexes of `edge`, or only those involving `vertex`
    pub(crate) fn drop_role_indexes(&self, edge: &LabelId, vertex: Option<&LabelId>) -> TopologyResult<()> {
        for index in self.role_indexes(edge) {
            if vertex.map_or(true, |v| index.vertices.contains(v)) {
                self.execute(&self.dialect.drop_index_statement(&edge.schema, &index.name))?;
            }
        }
        Ok(())
    }

    /// Create the role indexes of `edge`, or only those involving `vertex`
    pub(crate) fn create_role_indexes(&self, edge: &LabelId, vertex: Option<&LabelId>) -> TopologyResult<()> {
        let table = LabelKind::Edge.table_name(&edge.label);
        for index in self.role_indexes(edge) {
            if vertex.map_or(true, |v| index.vertices.contains(v)) {
                self.execute(&self.dialect.create_index_statement(
                    &edge.schema,
                    &table,
                    &index.name,
                    &index.columns,
                    index.unique,
                ))?;
            }
        }
        Ok(())
    }

    /// Add the foreign key columns of a new role to an edge table and
    /// attach the role. Returns `false` when the role already exists.
    pub(crate) fn ensure_edge_role(
        &mut self,
        edge: &LabelId,
        vertex: &LabelId,
        direction: Direction,
        multiplicity: Multiplicity,
    ) -> TopologyResult<bool> {
        let vertex_label = self.vertex_label(vertex)?;
        if vertex_label.edge_role(direction, edge).is_some() {
            return Ok(false);
        }
        if vertex_label.is_foreign() {
            return Err(TopologyError::ReadOnly(format!("vertex label {}", vertex)));
        }
        let edge_label = self.writable_edge_label(edge)?;
        let foreign_key = ForeignKey::for_vertex(&vertex_label, direction);
        let table = edge_label.table_name();

        let column_types = if vertex_label.has_identifiers() {
            vertex_label
                .identifiers()
                .iter()
                .map(|identifier| -> TopologyResult<String> {
                    let column = vertex_label.property(identifier).ok_or_else(|| {
                        TopologyError::PropertyNotFound(format!("{}.{}", vertex, identifier))
                    })?;
                    Ok(self.dialect.property_type_to_sql_definition(column.property_type())?)
                })
                .collect::<TopologyResult<Vec<_>>>()?
        } else {
            vec![self.dialect.foreign_key_type_definition().to_string()]
        };
        for (column, column_type) in foreign_key.columns.iter().zip(&column_types) {
            let definition = format!("{} {}", self.quote(column), column_type);
            self.execute(&self.dialect.add_column_statement(&edge.schema, &table, &definition))?;
        }
        let referenced = if vertex_label.has_identifiers() {
            vertex_label.identifiers().to_vec()
        } else {
            vec![ID.to_string()]
        };
        self.execute_all(self.dialect.foreign_key_statements(
            &edge.schema,
            &table,
            &foreign_key.columns,
            &vertex.schema,
            &vertex_label.table_name(),
            &referenced,
        ))?;

        let role = EdgeRole::new(vertex.clone(), edge.clone(), direction, multiplicity);
        self.record(format!("add edge role {}", role.name()));
        self.catalog_mut().attach_role(role);
        self.create_role_indexes(edge, Some(vertex))?;
        Ok(true)
    }
}

fn needs_pair_index(out: &EdgeRole, inn: &EdgeRole) -> bool {
    let (out, inn) = (out.multiplicity(), inn.multiplicity());
    (out.unique() || inn.unique()) && out.is_many() && inn.is_many()
}

pub(crate) fn role_index_name(edge: &LabelId, vertex: &LabelId, direction: Direction) -> String {
    format!(
        "{}{}_{}_{}{}_idx",
        EDGE_PREFIX,
        edge.label,
        vertex.schema,
        vertex.label,
        direction.foreign_key_suffix()
    )
}

pub(crate) fn pair_index_name(edge: &LabelId, out: &LabelId, inn: &LabelId) -> String {
    format!(
        "{}{}_{}_{}_{}_{}_uidx",
        EDGE_PREFIX, edge.label, out.schema, out.label, inn.schema, inn.label
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{ConnectionFactory, PostgresDialect, RecordingConnectionFactory};

    fn work() -> SchemaWork {
        let mut catalog = Catalog::with_schema("public");
        for name in ["A", "B"] {
            catalog.insert_vertex_label(VertexLabel::from_core(LabelCore::new(
                LabelId::new("public", name),
                Vec::new(),
            )));
        }
        catalog.insert_edge_label(EdgeLabel::from_core(LabelCore::new(
            LabelId::new("public", "ab"),
            Vec::new(),
        )));
        SchemaWork::new(Arc::new(catalog))
    }

    #[test]
    fn test_check_name_rejects_reserved_and_invalid() {
        let factory = RecordingConnectionFactory::new();
        let conn = factory.connect().unwrap();
        let dialect = PostgresDialect::new();
        let config = TopologyConfig::default();
        let mut work = work();
        let editor = SchemaEditor::new(conn.as_ref(), &dialect, &config, &mut work);
        assert!(editor.check_name("name").is_ok());
        assert!(matches!(
            editor.check_name("ID"),
            Err(TopologyError::InvalidColumnName(_))
        ));
        assert!(editor.check_name("bad name").is_err());
    }

    #[test]
    fn test_ensure_edge_role_adds_columns_and_unique_index() {
        let factory = RecordingConnectionFactory::new();
        let conn = factory.connect().unwrap();
        let dialect = PostgresDialect::new();
        let config = TopologyConfig::default();
        let mut work = work();
        let mut editor = SchemaEditor::new(conn.as_ref(), &dialect, &config, &mut work);
        let ab = LabelId::new("public", "ab");
        let a = LabelId::new("public", "A");

        assert!(editor
            .ensure_edge_role(&ab, &a, Direction::Out, Multiplicity::optional())
            .unwrap());
        assert!(!editor
            .ensure_edge_role(&ab, &a, Direction::Out, Multiplicity::optional())
            .unwrap());

        let statements = factory.statements();
        assert!(statements
            .iter()
            .any(|s| s.contains("ADD COLUMN \"public.A__O\" BIGINT")));
        assert!(statements
            .iter()
            .any(|s| s.contains("CREATE UNIQUE INDEX IF NOT EXISTS \"E_ab_public_A__O_idx\"")));
        assert_eq!(editor.catalog().edge_roles(&ab).len(), 1);
    }

    #[test]
    fn test_pair_index_for_unique_many_roles() {
        let factory = RecordingConnectionFactory::new();
        let conn = factory.connect().unwrap();
        let dialect = PostgresDialect::new();
        let config = TopologyConfig::default();
        let mut work = work();
        let mut editor = SchemaEditor::new(conn.as_ref(), &dialect, &config, &mut work);
        let ab = LabelId::new("public", "ab");
        let set = Multiplicity::many().with_unique(true);
        editor
            .ensure_edge_role(&ab, &LabelId::new("public", "A"), Direction::Out, set)
            .unwrap();
        editor
            .ensure_edge_role(&ab, &LabelId::new("public", "B"), Direction::In, set)
            .unwrap();

        let indexes = editor.role_indexes(&ab);
        let pair = indexes
            .iter()
            .find(|index| index.name == "E_ab_public_A_public_B_uidx")
            .unwrap();
        assert!(pair.unique);
        assert_eq!(
            pair.columns,
            vec!["public.A__O".to_string(), "public.B__I".to_string()]
        );
    }
}
