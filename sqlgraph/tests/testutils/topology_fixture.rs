//! Topology fixture for SqlGraph integration tests
//!
//! Every fixture owns its own temporary SQLite database, so tests can run
//! in parallel without sharing state.

use super::event_recorder::EventRecorder;
use sqlgraph::sql::sqlite::{SqliteConnectionFactory, SqliteDialect};
use sqlgraph::sql::{
    ConnectionFactory, PostgresDialect, RecordingConnectionFactory, SqlConnection, SqlValue,
};
use sqlgraph::{
    properties, PropertyDefinition, PropertyType, Topology, TopologyConfig, TopologyListener,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct TopologyFixture {
    topology: Arc<Topology>,
    factory: SqliteConnectionFactory,
    events: Arc<EventRecorder>,
    _temp_dir: tempfile::TempDir,
}

impl TopologyFixture {
    /// Create a fixture with the default configuration
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(TopologyConfig::default())
    }

    pub fn with_config(config: TopologyConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = tempfile::tempdir()?;
        let factory = SqliteConnectionFactory::new(temp_dir.path().join("sqlgraph_test.db"));
        let events = EventRecorder::new();
        let topology = Topology::builder(factory.clone(), SqliteDialect::new())
            .config(config)
            .listener(Arc::clone(&events) as Arc<dyn TopologyListener>)
            .build()?;
        Ok(Self {
            topology,
            factory,
            events,
            _temp_dir: temp_dir,
        })
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Events received by the fixture's listener
    pub fn events(&self) -> &Arc<EventRecorder> {
        &self.events
    }

    /// Open another topology over the same database, as a second node would
    pub fn open_node(&self, config: TopologyConfig) -> Result<Arc<Topology>, Box<dyn std::error::Error>> {
        Ok(Topology::builder(self.factory.clone(), SqliteDialect::new())
            .config(config)
            .node_id(Uuid::new_v4())
            .build()?)
    }

    pub fn connection(&self) -> Box<dyn SqlConnection> {
        self.factory
            .connect()
            .expect("Failed to open a SQLite connection")
    }

    /// Row count of a flattened SQLite table such as `public.V_Person`
    pub fn count_rows(&self, table: &str) -> i64 {
        let rows = self
            .connection()
            .query(&format!("SELECT COUNT(*) FROM \"{}\"", table), &[])
            .expect("Failed to count rows");
        rows[0][0].as_i64().expect("COUNT(*) is an integer")
    }

    /// Column names of a flattened SQLite table
    pub fn columns(&self, table: &str) -> Vec<String> {
        self.connection()
            .query(&format!("PRAGMA table_info(\"{}\")", table), &[])
            .expect("Failed to read table info")
            .into_iter()
            .filter_map(|row| row.get(1).and_then(|name| name.as_str()).map(str::to_string))
            .collect()
    }

    /// Whether a flattened SQLite index such as `public.E_ab_public_A__O_idx` exists
    pub fn index_exists(&self, index: &str) -> bool {
        !self
            .connection()
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?1",
                &[SqlValue::from(index)],
            )
            .expect("Failed to read sqlite_master")
            .is_empty()
    }

    pub fn table_exists(&self, table: &str) -> bool {
        !self
            .connection()
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[SqlValue::from(table)],
            )
            .expect("Failed to read sqlite_master")
            .is_empty()
    }
}

/// A topology over a statement recorder, generating PostgreSQL
pub fn recording_topology(config: TopologyConfig) -> (RecordingConnectionFactory, Arc<Topology>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let factory = RecordingConnectionFactory::new();
    let topology = Topology::builder(factory.clone(), PostgresDialect::new())
        .config(config)
        .build()
        .expect("Failed to open recording topology");
    (factory, topology)
}

/// `{name: STRING}`
pub fn name_property() -> BTreeMap<String, PropertyDefinition> {
    properties([("name", PropertyDefinition::of(PropertyType::String))])
}
