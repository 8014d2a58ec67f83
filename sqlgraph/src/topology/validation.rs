// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Drift detection between the catalog and the live database
//!
//! Validation reads table metadata through the dialect and reports every
//! table, column or index the catalog expects but the database lacks, and
//! property columns whose declared type differs. It never changes anything.
//! Foreign labels are skipped.

use super::catalog::Catalog;
use super::foreign_key::ForeignKey;
use super::label::{AbstractLabel, Label, LabelId, LabelKind, ID};
use crate::sql::{SqlConnection, SqlDialect, SqlResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingTable,
    MissingColumn(String),
    MissingIndex(String),
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },
}

/// One difference between the catalog and the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyValidationError {
    pub label: LabelId,
    pub kind: LabelKind,
    pub issue: ValidationIssue,
}

impl fmt::Display for TopologyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issue {
            ValidationIssue::MissingTable => {
                write!(f, "{} label {}: table does not exist", self.kind, self.label)
            }
            ValidationIssue::MissingColumn(column) => {
                write!(f, "{} label {}: column {} does not exist", self.kind, self.label, column)
            }
            ValidationIssue::MissingIndex(index) => {
                write!(f, "{} label {}: index {} does not exist", self.kind, self.label, index)
            }
            ValidationIssue::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "{} label {}: column {} has type {}, expected {}",
                self.kind, self.label, column, found, expected
            ),
        }
    }
}

pub(crate) fn validate_catalog(
    catalog: &Catalog,
    conn: &dyn SqlConnection,
    dialect: &dyn SqlDialect,
) -> SqlResult<Vec<TopologyValidationError>> {
    let mut errors = Vec::new();
    for label in catalog.labels() {
        if label.is_foreign() {
            continue;
        }
        validate_label(catalog, &label, conn, dialect, &mut errors)?;
    }
    Ok(errors)
}

fn validate_label(
    catalog: &Catalog,
    label: &Label,
    conn: &dyn SqlConnection,
    dialect: &dyn SqlDialect,
    errors: &mut Vec<TopologyValidationError>,
) -> SqlResult<()> {
    let id = label.id();
    let table = label.table_name();
    let issue = |issue: ValidationIssue| TopologyValidationError {
        label: id.clone(),
        kind: label.kind(),
        issue,
    };

    let columns: BTreeMap<String, String> = dialect
        .table_columns(conn, &id.schema, &table, None)?
        .into_iter()
        .map(|column| (column.name, column.sql_type))
        .collect();
    if columns.is_empty() {
        errors.push(issue(ValidationIssue::MissingTable));
        return Ok(());
    }

    let mut expected: Vec<String> = label.properties().keys().cloned().collect();
    if !label.has_identifiers() {
        expected.push(ID.to_string());
    }
    if label.kind() == LabelKind::Edge {
        if let Some(keys) = catalog.foreign_keys().get(&ForeignKey::edge_table(id)) {
            expected.extend(keys.iter().flat_map(|key| key.columns.iter().cloned()));
        }
    }
    for column in expected {
        if !columns.contains_key(&column) {
            errors.push(issue(ValidationIssue::MissingColumn(column)));
        }
    }

    for (name, column) in label.properties() {
        let Some(found) = columns.get(name) else {
            continue;
        };
        if !dialect.column_type_matches(column.property_type(), found) {
            errors.push(issue(ValidationIssue::TypeMismatch {
                column: name.clone(),
                expected: dialect.property_type_to_sql_definition(column.property_type())?,
                found: found.clone(),
            }));
        }
    }

    if !label.indexes().is_empty() {
        let indexes: BTreeSet<String> = dialect
            .table_indexes(conn, &id.schema, &table)?
            .into_iter()
            .collect();
        for name in label.indexes().keys() {
            if !indexes.contains(name) {
                errors.push(issue(ValidationIssue::MissingIndex(name.clone())));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = TopologyValidationError {
            label: LabelId::new("public", "Person"),
            kind: LabelKind::Vertex,
            issue: ValidationIssue::MissingColumn("name".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "vertex label public.Person: column name does not exist"
        );

        let error = TopologyValidationError {
            label: LabelId::new("public", "Person"),
            kind: LabelKind::Vertex,
            issue: ValidationIssue::TypeMismatch {
                column: "age".to_string(),
                expected: "INTEGER".to_string(),
                found: "TEXT".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "vertex label public.Person: column age has type TEXT, expected INTEGER"
        );
    }
}
