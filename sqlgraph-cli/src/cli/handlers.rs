// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers for SqlGraph

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::commands::OutputFormat;
use super::output::TopologyFormatter;
use sqlgraph::meta::{MetaStore, SqlMetaStore};
use sqlgraph::sql::sqlite::{SqliteConnectionFactory, SqliteDialect};
use sqlgraph::sql::ConnectionFactory;
use sqlgraph::{Schema, Topology};

/// Open the topology stored in `path`. The file must already exist.
fn open_topology(path: &Path) -> Result<Arc<Topology>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Database not found at {:?}", path).into());
    }
    log::debug!("Opening topology at {:?}", path);
    let topology = Topology::builder(SqliteConnectionFactory::new(path), SqliteDialect::new())
        .build()
        .map_err(|e| format!("Failed to open topology: {}", e))?;
    Ok(topology)
}

/// Handle the show command
pub fn handle_show(
    path: PathBuf,
    schema: Option<String>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let topology = open_topology(&path)?;
    let schemas: Vec<Arc<Schema>> = match schema {
        Some(name) => match topology.schema(&name) {
            Some(schema) => vec![schema],
            None => return Err(format!("Schema {} not found", name).into()),
        },
        None => topology.schemas(),
    };
    print!("{}", TopologyFormatter::format_schemas(&schemas, format));
    Ok(())
}

/// Handle the validate command. Fails when any drift is found.
pub fn handle_validate(path: PathBuf, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let topology = open_topology(&path)?;
    let issues = topology.validate_topology()?;
    print!("{}", TopologyFormatter::format_issues(&issues, format));
    if issues.is_empty() {
        Ok(())
    } else {
        Err(format!("{} drift issue(s) found", issues.len()).into())
    }
}

/// Handle the log command
pub fn handle_log(path: PathBuf, since: i64, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Database not found at {:?}", path).into());
    }
    let conn = SqliteConnectionFactory::new(&path).connect()?;
    let store = SqlMetaStore::new(Arc::new(SqliteDialect::new()));
    store.bootstrap(conn.as_ref())?;
    let entries = store.load_since(conn.as_ref(), since)?;
    if format == OutputFormat::Table {
        println!("{}", format!("Change log of {:?}", path).bold().green());
    }
    print!("{}", TopologyFormatter::format_log(&entries, format));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgraph::{properties, PropertyDefinition, PropertyType};

    fn populated_database() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let topology = Topology::builder(SqliteConnectionFactory::new(&path), SqliteDialect::new())
            .build()
            .unwrap();
        let mut tx = topology.begin().unwrap();
        tx.ensure_vertex_label_exist(
            "public",
            "Person",
            properties([("name", PropertyDefinition::of(PropertyType::String))]),
        )
        .unwrap();
        tx.commit().unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        assert!(handle_show(path.clone(), None, OutputFormat::Table).is_err());
        assert!(handle_log(path, 0, OutputFormat::Json).is_err());
    }

    #[test]
    fn test_commands_on_populated_database() {
        let (_dir, path) = populated_database();
        handle_show(path.clone(), None, OutputFormat::Table).unwrap();
        handle_show(path.clone(), Some("public".to_string()), OutputFormat::Json).unwrap();
        assert!(handle_show(path.clone(), Some("sales".to_string()), OutputFormat::Json).is_err());
        handle_validate(path.clone(), OutputFormat::Table).unwrap();
        handle_log(path, 0, OutputFormat::Table).unwrap();
    }
}
