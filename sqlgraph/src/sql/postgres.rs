// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! PostgreSQL dialect

use super::dialect::{ColumnMetadata, SqlDialect};
use super::{SqlConnection, SqlError, SqlResult, SqlValue};
use crate::topology::label::{Partition, PartitionType};
use crate::topology::property::PropertyType;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn qualified_table(&self, schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            self.maybe_wrap_in_quotes(schema),
            self.maybe_wrap_in_quotes(table)
        )
    }

    fn needs_semicolon(&self) -> bool {
        true
    }

    fn supports_cascade(&self) -> bool {
        true
    }

    fn supports_partitioning(&self) -> bool {
        true
    }

    fn auto_increment_primary_key_construct(&self) -> &'static str {
        "BIGSERIAL PRIMARY KEY"
    }

    fn property_type_to_sql_definition(&self, property_type: PropertyType) -> SqlResult<String> {
        let sql = match property_type {
            PropertyType::Boolean => "BOOLEAN".to_string(),
            PropertyType::Short => "SMALLINT".to_string(),
            PropertyType::Integer => "INTEGER".to_string(),
            PropertyType::Long => "BIGINT".to_string(),
            PropertyType::Float => "REAL".to_string(),
            PropertyType::Double => "DOUBLE PRECISION".to_string(),
            PropertyType::String => "TEXT".to_string(),
            PropertyType::Varchar(length) => format!("VARCHAR({})", length),
            PropertyType::LocalDate => "DATE".to_string(),
            PropertyType::LocalDateTime => "TIMESTAMP".to_string(),
            PropertyType::Json => "JSONB".to_string(),
            PropertyType::ByteArray => "BYTEA".to_string(),
            PropertyType::BooleanArray => "BOOLEAN[]".to_string(),
            PropertyType::IntegerArray => "INTEGER[]".to_string(),
            PropertyType::LongArray => "BIGINT[]".to_string(),
            PropertyType::DoubleArray => "DOUBLE PRECISION[]".to_string(),
            PropertyType::StringArray => "TEXT[]".to_string(),
        };
        Ok(sql)
    }

    /// `information_schema.columns.data_type` spells types out and reports
    /// every array as `ARRAY`
    fn column_type_matches(&self, property_type: PropertyType, found: &str) -> bool {
        let expected = match property_type {
            PropertyType::Boolean => "boolean",
            PropertyType::Short => "smallint",
            PropertyType::Integer => "integer",
            PropertyType::Long => "bigint",
            PropertyType::Float => "real",
            PropertyType::Double => "double precision",
            PropertyType::String => "text",
            PropertyType::Varchar(_) => "character varying",
            PropertyType::LocalDate => "date",
            PropertyType::LocalDateTime => "timestamp without time zone",
            PropertyType::Json => "jsonb",
            PropertyType::ByteArray => "bytea",
            PropertyType::BooleanArray
            | PropertyType::IntegerArray
            | PropertyType::LongArray
            | PropertyType::DoubleArray
            | PropertyType::StringArray => "ARRAY",
        };
        expected.eq_ignore_ascii_case(found.trim())
    }

    fn foreign_key_type_definition(&self) -> &'static str {
        "BIGINT"
    }

    fn cardinality_function(&self) -> &'static str {
        "CARDINALITY"
    }

    fn table_columns(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        table: &str,
        column: Option<&str>,
    ) -> SqlResult<Vec<ColumnMetadata>> {
        let mut sql = String::from(
            "SELECT c.column_name, c.data_type, c.is_nullable = 'NO', c.column_default, \
             EXISTS (SELECT 1 FROM information_schema.key_column_usage k \
             JOIN information_schema.table_constraints t ON t.constraint_name = k.constraint_name \
             WHERE t.constraint_type = 'PRIMARY KEY' AND k.table_schema = c.table_schema \
             AND k.table_name = c.table_name AND k.column_name = c.column_name) \
             FROM information_schema.columns c WHERE c.table_schema = $1 AND c.table_name = $2",
        );
        let mut params = vec![SqlValue::from(schema), SqlValue::from(table)];
        if let Some(column) = column {
            sql.push_str(" AND c.column_name = $3");
            params.push(SqlValue::from(column));
        }
        let rows = conn.query(&sql, &params)?;
        rows.into_iter().map(column_metadata).collect()
    }

    fn table_indexes(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        table: &str,
    ) -> SqlResult<Vec<String>> {
        let rows = conn.query(
            "SELECT indexname FROM pg_indexes WHERE schemaname = $1 AND tablename = $2",
            &[SqlValue::from(schema), SqlValue::from(table)],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect())
    }

    fn create_schema_statement(&self, schema: &str, if_not_exists: bool) -> Option<String> {
        Some(format!(
            "CREATE SCHEMA {}{}",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.maybe_wrap_in_quotes(schema)
        ))
    }

    fn drop_schema_statement(&self, schema: &str) -> Option<String> {
        Some(format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            self.maybe_wrap_in_quotes(schema)
        ))
    }

    fn rename_table(&self, schema: &str, old: &str, new: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualified_table(schema, old),
            self.maybe_wrap_in_quotes(new)
        )
    }

    fn create_index_statement(
        &self,
        schema: &str,
        table: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
    ) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            self.maybe_wrap_in_quotes(index_name),
            self.qualified_table(schema, table),
            quoted_list(self, columns)
        )
    }

    fn drop_index_statement(&self, schema: &str, index_name: &str) -> String {
        format!(
            "DROP INDEX IF EXISTS {}",
            self.qualified_table(schema, index_name)
        )
    }

    fn required_statements(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        required: bool,
    ) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
            self.qualified_table(schema, table),
            self.maybe_wrap_in_quotes(column),
            if required { "SET" } else { "DROP" }
        )]
    }

    fn check_constraint_statements(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        _column: &str,
        expression: Option<&str>,
    ) -> Vec<String> {
        let table = self.qualified_table(schema, table);
        let mut statements = vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
            table,
            self.maybe_wrap_in_quotes(constraint)
        )];
        if let Some(expression) = expression {
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
                table,
                self.maybe_wrap_in_quotes(constraint),
                expression
            ));
        }
        statements
    }

    fn default_statements(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        default: Option<&str>,
    ) -> Vec<String> {
        let action = match default {
            Some(literal) => format!("SET DEFAULT {}", literal),
            None => "DROP DEFAULT".to_string(),
        };
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            self.qualified_table(schema, table),
            self.maybe_wrap_in_quotes(column),
            action
        )]
    }

    fn foreign_key_statements(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        referenced_schema: &str,
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} ADD FOREIGN KEY ({}) REFERENCES {} ({}) DEFERRABLE",
            self.qualified_table(schema, table),
            quoted_list(self, columns),
            self.qualified_table(referenced_schema, referenced_table),
            quoted_list(self, referenced_columns)
        )]
    }

    fn partition_clause(&self, partition_type: PartitionType, expression: &str) -> SqlResult<String> {
        match partition_type {
            PartitionType::Range => Ok(format!(" PARTITION BY RANGE ({})", expression)),
            PartitionType::List => Ok(format!(" PARTITION BY LIST ({})", expression)),
            PartitionType::None => Ok(String::new()),
        }
    }

    fn create_partition_statement(
        &self,
        schema: &str,
        table: &str,
        partition: &Partition,
    ) -> SqlResult<String> {
        let bounds = match (&partition.from, &partition.to, &partition.in_values) {
            (_, _, Some(values)) => format!("FOR VALUES IN ({})", values),
            (Some(from), Some(to), None) => format!("FOR VALUES FROM ({}) TO ({})", from, to),
            _ => {
                return Err(SqlError::Unsupported(format!(
                    "Partition {} has no bounds",
                    partition.name
                )))
            }
        };
        Ok(format!(
            "CREATE TABLE {} PARTITION OF {} {}",
            self.qualified_table(schema, &partition.name),
            self.qualified_table(schema, table),
            bounds
        ))
    }
}

fn quoted_list(dialect: &dyn SqlDialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| dialect.maybe_wrap_in_quotes(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_metadata(row: Vec<SqlValue>) -> SqlResult<ColumnMetadata> {
    let mut values = row.into_iter();
    let mut next = || values.next().unwrap_or(SqlValue::Null);
    let name = next();
    let sql_type = next();
    let not_null = next();
    let default = next();
    let primary_key = next();
    Ok(ColumnMetadata {
        name: name
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SqlError::Execution("column metadata without a name".to_string()))?,
        sql_type: sql_type.as_str().unwrap_or_default().to_string(),
        not_null: not_null.as_i64().unwrap_or(0) != 0,
        default: default.as_str().map(str::to_string),
        primary_key: primary_key.as_i64().unwrap_or(0) != 0,
    })
}
