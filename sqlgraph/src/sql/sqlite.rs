// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQLite backend
//!
//! SQLite has no schemas inside one database file, so `schema.table` is
//! flattened into a single quoted table name. Required-ness and CHECK
//! constraints are expressed as `BEFORE INSERT/UPDATE` triggers, since SQLite
//! cannot add or drop constraints on an existing table.

use super::dialect::{ColumnMetadata, SqlDialect};
use super::{ConnectionFactory, SqlConnection, SqlError, SqlResult, SqlValue};
use crate::topology::label::{Partition, PartitionType};
use crate::topology::property::PropertyType;
use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl From<rusqlite::Error> for SqlError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                SqlError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            _ => SqlError::Execution(err.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Boolean(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
            SqlValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            SqlValue::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            SqlValue::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value)),
        })
    }
}

fn from_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(value) => SqlValue::Integer(value),
        Value::Real(value) => SqlValue::Real(value),
        Value::Text(value) => SqlValue::Text(value),
        Value::Blob(value) => SqlValue::Blob(value),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }

    fn trigger_statements(
        &self,
        schema: &str,
        table: &str,
        trigger: &str,
        column: &str,
        condition: Option<&str>,
        message: &str,
    ) -> Vec<String> {
        let insert_trigger = self.qualified_table(schema, &format!("{}_i", trigger));
        let update_trigger = self.qualified_table(schema, &format!("{}_u", trigger));
        let mut statements = vec![
            format!("DROP TRIGGER IF EXISTS {}", insert_trigger),
            format!("DROP TRIGGER IF EXISTS {}", update_trigger),
        ];
        if let Some(condition) = condition {
            let table = self.qualified_table(schema, table);
            let raise = format!(
                "BEGIN SELECT RAISE(ABORT, '{}'); END",
                message.replace('\'', "''")
            );
            statements.push(format!(
                "CREATE TRIGGER {} BEFORE INSERT ON {} FOR EACH ROW WHEN {} {}",
                insert_trigger, table, condition, raise
            ));
            statements.push(format!(
                "CREATE TRIGGER {} BEFORE UPDATE OF {} ON {} FOR EACH ROW WHEN {} {}",
                update_trigger,
                self.maybe_wrap_in_quotes(column),
                table,
                condition,
                raise
            ));
        }
        statements
    }
}

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn qualified_table(&self, schema: &str, table: &str) -> String {
        self.maybe_wrap_in_quotes(&format!("{}.{}", schema, table))
    }

    fn needs_semicolon(&self) -> bool {
        false
    }

    fn supports_cascade(&self) -> bool {
        false
    }

    fn supports_partitioning(&self) -> bool {
        false
    }

    fn auto_increment_primary_key_construct(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn property_type_to_sql_definition(&self, property_type: PropertyType) -> SqlResult<String> {
        let sql = match property_type {
            PropertyType::Boolean => "BOOLEAN".to_string(),
            PropertyType::Short => "SMALLINT".to_string(),
            PropertyType::Integer => "INTEGER".to_string(),
            PropertyType::Long => "BIGINT".to_string(),
            PropertyType::Float => "REAL".to_string(),
            PropertyType::Double => "DOUBLE".to_string(),
            PropertyType::String => "TEXT".to_string(),
            PropertyType::Varchar(length) => format!("VARCHAR({})", length),
            PropertyType::LocalDate => "DATE".to_string(),
            PropertyType::LocalDateTime => "TIMESTAMP".to_string(),
            PropertyType::ByteArray => "BLOB".to_string(),
            // arrays are stored as JSON text
            PropertyType::Json
            | PropertyType::BooleanArray
            | PropertyType::IntegerArray
            | PropertyType::LongArray
            | PropertyType::DoubleArray
            | PropertyType::StringArray => "TEXT".to_string(),
        };
        Ok(sql)
    }

    fn foreign_key_type_definition(&self) -> &'static str {
        "BIGINT"
    }

    fn cardinality_function(&self) -> &'static str {
        "json_array_length"
    }

    fn table_columns(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        table: &str,
        column: Option<&str>,
    ) -> SqlResult<Vec<ColumnMetadata>> {
        let mut sql = String::from(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        );
        let mut params = vec![SqlValue::from(format!("{}.{}", schema, table))];
        if let Some(column) = column {
            sql.push_str(" WHERE name = ?2");
            params.push(SqlValue::from(column));
        }
        let rows = conn.query(&sql, &params)?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = row.into_iter();
            let name = values.next().unwrap_or(SqlValue::Null);
            let sql_type = values.next().unwrap_or(SqlValue::Null);
            let not_null = values.next().unwrap_or(SqlValue::Null);
            let default = values.next().unwrap_or(SqlValue::Null);
            let primary_key = values.next().unwrap_or(SqlValue::Null);
            let Some(name) = name.as_str().map(str::to_string) else {
                continue;
            };
            columns.push(ColumnMetadata {
                name,
                sql_type: sql_type.as_str().unwrap_or_default().to_string(),
                not_null: not_null.as_i64().unwrap_or(0) != 0,
                default: default.as_str().map(str::to_string),
                primary_key: primary_key.as_i64().unwrap_or(0) != 0,
            });
        }
        Ok(columns)
    }

    fn table_indexes(
        &self,
        conn: &dyn SqlConnection,
        schema: &str,
        table: &str,
    ) -> SqlResult<Vec<String>> {
        let rows = conn.query(
            "SELECT name FROM pragma_index_list(?1)",
            &[SqlValue::from(format!("{}.{}", schema, table))],
        )?;
        let prefix = format!("{}.", schema);
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter_map(|value| value.as_str().map(str::to_string))
            .filter(|name| !name.starts_with("sqlite_autoindex"))
            .map(|name| match name.strip_prefix(&prefix) {
                Some(stripped) => stripped.to_string(),
                None => name,
            })
            .collect())
    }

    fn create_schema_statement(&self, _schema: &str, _if_not_exists: bool) -> Option<String> {
        None
    }

    fn drop_schema_statement(&self, _schema: &str) -> Option<String> {
        None
    }

    fn rename_table(&self, schema: &str, old: &str, new: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualified_table(schema, old),
            self.qualified_table(schema, new)
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
            self.qualified_table(schema, index_name),
            self.qualified_table(schema, table),
            columns
                .iter()
                .map(|column| self.maybe_wrap_in_quotes(column))
                .collect::<Vec<_>>()
                .join(", ")
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
        let condition = format!("NEW.{} IS NULL", self.maybe_wrap_in_quotes(column));
        self.trigger_statements(
            schema,
            table,
            &format!("{}_{}_nn", table, column),
            column,
            required.then_some(condition.as_str()),
            &format!("NOT NULL constraint failed: {}.{}", table, column),
        )
    }

    fn check_constraint_statements(
        &self,
        schema: &str,
        table: &str,
        constraint: &str,
        column: &str,
        expression: Option<&str>,
    ) -> Vec<String> {
        let quoted = self.maybe_wrap_in_quotes(column);
        let condition = expression.map(|expression| {
            format!(
                "NOT (SELECT ({}) FROM (SELECT NEW.{} AS {}))",
                expression, quoted, quoted
            )
        });
        self.trigger_statements(
            schema,
            table,
            constraint,
            column,
            condition.as_deref(),
            &format!("CHECK constraint failed: {}", constraint),
        )
    }

    /// SQLite cannot change the default of an existing column
    fn default_statements(
        &self,
        _schema: &str,
        table: &str,
        column: &str,
        _default: Option<&str>,
    ) -> Vec<String> {
        log::debug!(
            "Default of {}.{} is only applied to columns created afterwards",
            table,
            column
        );
        Vec::new()
    }

    /// Referential integrity is left to the topology: SQLite cannot add a
    /// foreign key to an existing table, nor drop a column that has one.
    fn foreign_key_statements(
        &self,
        _schema: &str,
        _table: &str,
        _columns: &[String],
        _referenced_schema: &str,
        _referenced_table: &str,
        _referenced_columns: &[String],
    ) -> Vec<String> {
        Vec::new()
    }

    fn partition_clause(&self, partition_type: PartitionType, _expression: &str) -> SqlResult<String> {
        match partition_type {
            PartitionType::None => Ok(String::new()),
            other => Err(SqlError::Unsupported(format!(
                "SQLite does not support {:?} partitioning",
                other
            ))),
        }
    }

    fn create_partition_statement(
        &self,
        _schema: &str,
        _table: &str,
        partition: &Partition,
    ) -> SqlResult<String> {
        Err(SqlError::Unsupported(format!(
            "SQLite does not support partition {}",
            partition.name
        )))
    }
}

/// One SQLite connection
pub struct SqliteConnection {
    conn: Mutex<Connection>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> SqlResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| SqlError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SqlConnection for SqliteConnection {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> SqlResult<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> SqlResult<Vec<Vec<SqlValue>>> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(sql)?;
        let width = statement.column_count();
        let rows = statement.query_map(params_from_iter(params.iter()), |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i).map(from_value))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn last_insert_id(&self) -> SqlResult<i64> {
        Ok(self.conn.lock().last_insert_rowid())
    }
}

/// Opens connections to one SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteConnectionFactory {
    path: PathBuf,
}

impl SqliteConnectionFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    fn connect(&self) -> SqlResult<Box<dyn SqlConnection>> {
        Ok(Box::new(SqliteConnection::open(&self.path)?))
    }
}
