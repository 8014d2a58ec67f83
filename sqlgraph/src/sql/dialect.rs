// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQL dialect abstraction
//!
//! A dialect owns every piece of SQL text the topology engine needs:
//! identifier quoting, DDL for tables, columns, indexes and partitions, the
//! constraint statements derived from property definitions, and the
//! metadata queries used for drift validation.

use super::{SqlConnection, SqlResult};
use crate::topology::label::{Partition, PartitionType};
use crate::topology::property::{PropertyDefinition, PropertyType};
use once_cell::sync::Lazy;
use regex::Regex;

static COLUMN_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").ok());

/// Live column metadata read from the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn create_table_statement(&self) -> &'static str {
        "CREATE TABLE "
    }

    fn maybe_wrap_in_quotes(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Positional parameter marker, 1-based
    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    /// Quoted, schema-qualified table name
    fn qualified_table(&self, schema: &str, table: &str) -> String;

    fn needs_semicolon(&self) -> bool;

    fn supports_cascade(&self) -> bool;

    fn supports_partitioning(&self) -> bool;

    fn auto_increment_primary_key_construct(&self) -> &'static str;

    fn property_type_to_sql_definition(&self, property_type: PropertyType) -> SqlResult<String>;

    /// Whether a declared column type, as `table_columns` reports it, is the
    /// one this dialect generates for `property_type`
    fn column_type_matches(&self, property_type: PropertyType, found: &str) -> bool {
        match self.property_type_to_sql_definition(property_type) {
            Ok(expected) => normalize_type(&expected) == normalize_type(found),
            Err(_) => true,
        }
    }

    /// Column type of a foreign key to a surrogate `ID`
    fn foreign_key_type_definition(&self) -> &'static str;

    /// Function returning the number of elements of an array column
    fn cardinality_function(&self) -> &'static str;

    fn validate_column_name(&self, name: &str, max_length: usize) -> Result<(), String> {
        if name.len() > max_length {
            return Err(format!(
                "{} is longer than {} characters",
                name, max_length
            ));
        }
        if !COLUMN_NAME.as_ref().is_some_and(|pattern| pattern.is_match(name)) {
            return Err(format!("{} is not a valid column name", name));
        }
        Ok(())
    }

    /// Columns of a table, optionally restricted to one column
    fn table_columns(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        table: &str,
        column: Option<&str>,
    ) -> SqlResult<Vec<ColumnMetadata>>;

    /// Index names of a table, as the topology names them
    fn table_indexes(&self, conn: &dyn SqlConnection, schema: &str, table: &str)
        -> SqlResult<Vec<String>>;

    fn create_schema_statement(&self, schema: &str, if_not_exists: bool) -> Option<String>;

    fn drop_schema_statement(&self, schema: &str) -> Option<String>;

    fn rename_table(&self, schema: &str, old: &str, new: &str) -> String;

    fn drop_table_statement(&self, schema: &str, table: &str) -> String {
        let mut sql = format!("DROP TABLE IF EXISTS {}", self.qualified_table(schema, table));
        if self.supports_cascade() {
            sql.push_str(" CASCADE");
        }
        sql
    }

    fn add_column_statement(&self, schema: &str, table: &str, column_definition: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified_table(schema, table),
            column_definition
        )
    }

    fn drop_column_statement(&self, schema: &str, table: &str, column: &str) -> String {
        let mut sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualified_table(schema, table),
            self.maybe_wrap_in_quotes(column)
        );
        if self.supports_cascade() {
            sql.push_str(" CASCADE");
        }
        sql
    }

    fn rename_column_statement(&self, schema: &str, table: &str, old: &str, new: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.qualified_table(schema, table),
            self.maybe_wrap_in_quotes(old),
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
    ) -> String;

    fn drop_index_statement(&self, schema: &str, index_name: &str) -> String;

    /// Statements making a column required or optional
    fn required_statements(&self, schema: &str, table: &str, column: &str, required: bool)
        -> Vec<String>;

    /// Statements dropping the named check and, when given, recreating it
    fn check_constraint_statements(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        column: &str,
        expression: Option<&str>,
    ) -> Vec<String>;

    /// Statements changing the default of a column
    fn default_statements(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        default: Option<&str>,
    ) -> Vec<String>;

    /// Statements enforcing referential integrity from an edge table
    fn foreign_key_statements(
        &self,
        schema: &str,
        table: &str,
        columns: &[String],
        referenced_schema: &str,
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> Vec<String>;

    /// `PARTITION BY` clause appended to a partitioned table definition
    fn partition_clause(&self, partition_type: PartitionType, expression: &str) -> SqlResult<String>;

    fn create_partition_statement(
        &self,
        schema: &str,
        table: &str,
        partition: &Partition,
    ) -> SqlResult<String>;

    fn drop_partition_statement(&self, schema: &str, partition: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified_table(schema, partition))
    }

    /// `"name" TYPE [DEFAULT literal]`
    fn column_definition(&self, name: &str, definition: &PropertyDefinition) -> SqlResult<String> {
        let mut sql = format!(
            "{} {}",
            self.maybe_wrap_in_quotes(name),
            self.property_type_to_sql_definition(definition.property_type)?
        );
        if let Some(default) = &definition.default_literal {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        Ok(sql)
    }

    /// Constraint statements derived from a property definition
    fn constraint_statements(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        definition: &PropertyDefinition,
    ) -> SqlResult<Vec<String>> {
        let mut statements = Vec::new();
        if definition.multiplicity.is_required() {
            statements.extend(self.required_statements(schema, table, column, true));
        }
        if let Some(check) = &definition.check_constraint {
            statements.extend(self.check_constraint_statements(
                schema,
                table,
                &check_constraint_name(table, column),
                column,
                Some(check),
            ));
        }
        if definition.property_type.is_array() && definition.multiplicity.has_limits() {
            let expression = definition
                .multiplicity
                .to_check_constraint_with(
                    self.cardinality_function(),
                    &self.maybe_wrap_in_quotes(column),
                )
                .map_err(|e| super::SqlError::Unsupported(e.to_string()))?;
            statements.extend(self.check_constraint_statements(
                schema,
                table,
                &cardinality_constraint_name(table, column),
                column,
                Some(&expression),
            ));
        }
        Ok(statements)
    }

    /// Statements removing what [`SqlDialect::constraint_statements`] added
    fn drop_constraint_statements(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        definition: &PropertyDefinition,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        if definition.multiplicity.is_required() {
            statements.extend(self.required_statements(schema, table, column, false));
        }
        if definition.check_constraint.is_some() {
            statements.extend(self.check_constraint_statements(
                schema,
                table,
                &check_constraint_name(table, column),
                column,
                None,
            ));
        }
        if definition.property_type.is_array() && definition.multiplicity.has_limits() {
            statements.extend(self.check_constraint_statements(
                schema,
                table,
                &cardinality_constraint_name(table, column),
                column,
                None,
            ));
        }
        statements
    }
}

pub fn check_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_check", table, column)
}

pub fn cardinality_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_card", table, column)
}

/// Uppercase with whitespace removed, so `varchar (10)` equals `VARCHAR(10)`
pub fn normalize_type(sql_type: &str) -> String {
    sql_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::PostgresDialect;

    #[test]
    fn test_validate_column_name() {
        let dialect = PostgresDialect::new();
        assert!(dialect.validate_column_name("name", 63).is_ok());
        assert!(dialect.validate_column_name("first_name2", 63).is_ok());
        assert!(dialect.validate_column_name("bad name", 63).is_err());
        assert!(dialect.validate_column_name("x\"y", 63).is_err());
        assert!(dialect.validate_column_name(&"a".repeat(64), 63).is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_column_type_matches() {
        let dialect = crate::sql::sqlite::SqliteDialect::new();
        assert!(dialect.column_type_matches(PropertyType::Integer, "integer"));
        assert!(dialect.column_type_matches(PropertyType::Varchar(10), "VARCHAR (10)"));
        assert!(!dialect.column_type_matches(PropertyType::Integer, "TEXT"));
        assert!(!dialect.column_type_matches(PropertyType::Varchar(10), "VARCHAR(20)"));
    }

    #[test]
    fn test_constraint_statements_follow_definition() {
        let dialect = PostgresDialect::new();
        let definition = PropertyDefinition::of(PropertyType::String)
            .with_multiplicity(crate::topology::multiplicity::Multiplicity::required())
            .with_check("\"name\" <> ''");
        let statements = dialect
            .constraint_statements("public", "V_A", "name", &definition)
            .unwrap();
        assert!(statements.iter().any(|s| s.contains("SET NOT NULL")));
        assert!(statements
            .iter()
            .any(|s| s.contains("ADD CONSTRAINT \"V_A_name_check\" CHECK (\"name\" <> '')")));

        let dropped = dialect.drop_constraint_statements("public", "V_A", "name", &definition);
        assert!(dropped.iter().any(|s| s.contains("DROP NOT NULL")));
        assert!(dropped.iter().all(|s| !s.contains("ADD CONSTRAINT")));
    }

    #[test]
    fn test_array_cardinality_constraint() {
        let dialect = PostgresDialect::new();
        let definition = PropertyDefinition::of(PropertyType::StringArray)
            .with_multiplicity(crate::topology::multiplicity::Multiplicity::of(1, 3).unwrap());
        let statements = dialect
            .constraint_statements("public", "V_A", "tags", &definition)
            .unwrap();
        assert!(statements
            .iter()
            .any(|s| s.contains("CARDINALITY(\"tags\") <= 3")));
    }
}
