// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Formatting for CLI output

use super::commands::OutputFormat;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use sqlgraph::meta::MetaLogEntry;
use sqlgraph::{AbstractLabel, Schema, TopologyValidationError};
use std::sync::Arc;

/// Formatter for catalog listings, drift reports and log entries
pub struct TopologyFormatter;

impl TopologyFormatter {
    pub fn format_schemas(schemas: &[Arc<Schema>], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::schemas_table(schemas),
            OutputFormat::Json => Self::pretty(&Self::schemas_json(schemas)),
        }
    }

    pub fn format_issues(issues: &[TopologyValidationError], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::issues_table(issues),
            OutputFormat::Json => Self::pretty(&serde_json::json!({
                "status": if issues.is_empty() { "ok" } else { "drift" },
                "issues": issues.iter().map(|issue| issue.to_string()).collect::<Vec<_>>(),
            })),
        }
    }

    pub fn format_log(entries: &[MetaLogEntry], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::log_table(entries),
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "id": entry.id,
                            "notification": entry.notification,
                        })
                    })
                    .collect();
                Self::pretty(&serde_json::Value::Array(entries))
            }
        }
    }

    fn schemas_table(schemas: &[Arc<Schema>]) -> String {
        if schemas.is_empty() {
            return format!("{}\n", "No schemas found".yellow());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["Schema", "Label", "Kind", "Properties", "Edge roles"]
                .into_iter()
                .map(|header| Cell::new(header).fg(Color::Green)),
        );

        let mut labels = 0;
        for schema in schemas {
            let name = if schema.is_foreign() {
                format!("{} (foreign)", schema.name())
            } else {
                schema.name().to_string()
            };
            if schema.is_empty() {
                let mut row = vec![String::new(); 5];
                row[0] = name.clone();
                table.add_row(row);
            }
            for vertex in schema.vertex_labels().values() {
                let roles: Vec<String> = vertex.all_edge_roles().map(|role| role.to_string()).collect();
                table.add_row(vec![
                    name.clone(),
                    vertex.name().to_string(),
                    "vertex".to_string(),
                    Self::properties(vertex.as_ref()),
                    roles.join("\n"),
                ]);
                labels += 1;
            }
            for edge in schema.edge_labels().values() {
                table.add_row(vec![
                    name.clone(),
                    edge.name().to_string(),
                    "edge".to_string(),
                    Self::properties(edge.as_ref()),
                    String::new(),
                ]);
                labels += 1;
            }
        }

        let mut output = String::new();
        output.push_str(&format!("{}\n", "Topology".bold().green()));
        output.push_str(&format!("Schemas: {}, labels: {}\n\n", schemas.len(), labels));
        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    /// `name:TYPE` per line, identifiers marked with `*`
    fn properties<L: AbstractLabel + ?Sized>(label: &L) -> String {
        label
            .properties()
            .values()
            .map(|column| {
                let marker = if label.identifiers().iter().any(|i| i == column.name()) {
                    "*"
                } else {
                    ""
                };
                format!("{}{} {}", marker, column, column.multiplicity())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn schemas_json(schemas: &[Arc<Schema>]) -> serde_json::Value {
        serde_json::Value::Array(
            schemas
                .iter()
                .map(|schema| {
                    serde_json::json!({
                        "schema": schema.name(),
                        "foreign": schema.is_foreign(),
                        "vertexLabels": schema
                            .vertex_labels()
                            .values()
                            .map(|vertex| {
                                let mut json = Self::label_json(vertex.as_ref());
                                json["edgeRoles"] = serde_json::json!(vertex
                                    .all_edge_roles()
                                    .map(|role| role.to_string())
                                    .collect::<Vec<_>>());
                                json
                            })
                            .collect::<Vec<_>>(),
                        "edgeLabels": schema
                            .edge_labels()
                            .values()
                            .map(|edge| Self::label_json(edge.as_ref()))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect(),
        )
    }

    fn label_json<L: AbstractLabel + ?Sized>(label: &L) -> serde_json::Value {
        serde_json::json!({
            "name": label.name(),
            "identifiers": label.identifiers(),
            "properties": label
                .properties()
                .values()
                .map(|column| serde_json::json!({
                    "name": column.name(),
                    "type": column.property_type().to_string(),
                    "multiplicity": column.multiplicity().to_string(),
                }))
                .collect::<Vec<_>>(),
            "indexes": label.indexes().keys().collect::<Vec<_>>(),
        })
    }

    fn issues_table(issues: &[TopologyValidationError]) -> String {
        if issues.is_empty() {
            return format!("{}\n", "Topology matches the database".green());
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["Label", "Kind", "Issue"]
                .into_iter()
                .map(|header| Cell::new(header).fg(Color::Red)),
        );
        for issue in issues {
            table.add_row(vec![
                issue.label.to_string(),
                issue.kind.to_string(),
                format!("{:?}", issue.issue),
            ]);
        }
        format!(
            "{}\n{}\n",
            format!("{} drift issue(s)", issues.len()).bold().red(),
            table
        )
    }

    fn log_table(entries: &[MetaLogEntry]) -> String {
        if entries.is_empty() {
            return format!("{}\n", "No log entries found".yellow());
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["Id", "Committed", "Origin", "Schemas"]
                .into_iter()
                .map(|header| Cell::new(header).fg(Color::Green)),
        );
        for entry in entries {
            let notification = &entry.notification;
            table.add_row(vec![
                entry.id.to_string(),
                notification.timestamp.to_rfc3339(),
                notification.origin.to_string(),
                notification
                    .schemas
                    .iter()
                    .map(|schema| schema.schema.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]);
        }
        format!("{}\n", table)
    }

    fn pretty(value: &serde_json::Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| {
            "{\"status\": \"error\", \"error\": \"Could not serialize output to JSON\"}".to_string()
        })
    }
}
