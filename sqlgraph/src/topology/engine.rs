// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The topology engine
//!
//! [`Topology`] owns the committed catalog, the schema-change gate and the
//! listener registry. Transactions read the committed catalog through
//! snapshots; a transaction that changes structure takes the gate, edits a
//! private copy, and hands the copy back at commit. The delta between the
//! two is persisted to the meta store, merged into the committed catalog
//! and published to other nodes.

use super::catalog::Catalog;
use super::change_set::{ChangeSet, SchemaWork};
use super::edge_label::EdgeLabel;
use super::error::{TopologyError, TopologyResult};
use super::foreign_key::ForeignKeyCache;
use super::gate::{GateHolder, SchemaChangeGate};
use super::label::LabelId;
use super::listener::{ListenerRegistry, TopologyElement, TopologyEvent, TopologyListener};
use super::schema::Schema;
use super::validation::{validate_catalog, TopologyValidationError};
use super::vertex_label::VertexLabel;
use crate::config::TopologyConfig;
use crate::meta::{MetaStore, SqlMetaStore};
use crate::notify::{Notification, NotificationCodec, NotificationPublisher};
use crate::sql::{ConnectionFactory, SqlConnection, SqlDialect};
use crate::txn::{Transaction, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct Topology {
    node_id: Uuid,
    config: TopologyConfig,
    factory: Arc<dyn ConnectionFactory>,
    dialect: Arc<dyn SqlDialect>,
    meta: Arc<dyn MetaStore>,
    publisher: Option<Arc<dyn NotificationPublisher>>,
    catalog: RwLock<Arc<Catalog>>,
    gate: SchemaChangeGate,
    listeners: ListenerRegistry,
    next_txn: AtomicU64,
    /// Highest meta log id seen
    log_cursor: Mutex<i64>,
    /// Serializes remote applies; they all share one gate holder
    remote_lock: Mutex<()>,
}

/// Builder for [`Topology`]
pub struct TopologyBuilder {
    factory: Arc<dyn ConnectionFactory>,
    dialect: Arc<dyn SqlDialect>,
    config: TopologyConfig,
    meta: Option<Arc<dyn MetaStore>>,
    publisher: Option<Arc<dyn NotificationPublisher>>,
    listeners: Vec<Arc<dyn TopologyListener>>,
    node_id: Option<Uuid>,
}

impl TopologyBuilder {
    pub fn new<F, D>(factory: F, dialect: D) -> Self
    where
        F: ConnectionFactory + 'static,
        D: SqlDialect + 'static,
    {
        Self::from_shared(Arc::new(factory), Arc::new(dialect))
    }

    pub fn from_shared(factory: Arc<dyn ConnectionFactory>, dialect: Arc<dyn SqlDialect>) -> Self {
        Self {
            factory,
            dialect,
            config: TopologyConfig::default(),
            meta: None,
            publisher: None,
            listeners: Vec::new(),
            node_id: None,
        }
    }

    pub fn config(mut self, config: TopologyConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another meta store than the log table in the graph database
    pub fn meta_store(mut self, meta: Arc<dyn MetaStore>) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn NotificationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Register a listener before the catalog is loaded
    pub fn listener(mut self, listener: Arc<dyn TopologyListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn node_id(mut self, node_id: Uuid) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Open the topology: bootstrap the meta store and replay its log
    pub fn build(self) -> TopologyResult<Arc<Topology>> {
        let meta = self
            .meta
            .unwrap_or_else(|| Arc::new(SqlMetaStore::new(Arc::clone(&self.dialect))));
        let catalog = Catalog::with_schema(&self.config.default_schema);
        let topology = Topology {
            node_id: self.node_id.unwrap_or_else(Uuid::new_v4),
            config: self.config,
            factory: self.factory,
            dialect: self.dialect,
            meta,
            publisher: self.publisher,
            catalog: RwLock::new(Arc::new(catalog)),
            gate: SchemaChangeGate::new(),
            listeners: ListenerRegistry::new(),
            next_txn: AtomicU64::new(1),
            log_cursor: Mutex::new(0),
            remote_lock: Mutex::new(()),
        };
        for listener in self.listeners {
            topology.listeners.register(listener);
        }
        topology.open()?;
        Ok(Arc::new(topology))
    }
}

impl Topology {
    pub fn builder<F, D>(factory: F, dialect: D) -> TopologyBuilder
    where
        F: ConnectionFactory + 'static,
        D: SqlDialect + 'static,
    {
        TopologyBuilder::new(factory, dialect)
    }

    fn open(&self) -> TopologyResult<()> {
        let conn = self.factory.connect()?;
        conn.begin()?;
        match self.recover(conn.as_ref()) {
            Ok(()) => conn.commit()?,
            Err(err) => {
                if let Err(rollback) = conn.rollback() {
                    log::warn!("Rollback after failed open failed: {}", rollback);
                }
                return Err(err);
            }
        }
        if self.config.validate_on_open {
            for issue in validate_catalog(&self.snapshot(), conn.as_ref(), self.dialect.as_ref())? {
                log::warn!("Topology drift: {}", issue);
            }
        }
        Ok(())
    }

    fn recover(&self, conn: &dyn SqlConnection) -> TopologyResult<()> {
        self.meta.bootstrap(conn)?;
        if let Some(sql) = self
            .dialect
            .create_schema_statement(&self.config.default_schema, true)
        {
            log::debug!("{}", sql);
            conn.execute(&sql, &[])?;
        }

        let entries = self.meta.load_since(conn, 0)?;
        let mut catalog = Catalog::with_schema(&self.config.default_schema);
        let mut cursor = 0;
        for entry in &entries {
            catalog.apply(&NotificationCodec::to_change_set(&entry.notification)?);
            cursor = entry.id;
        }
        log::info!(
            "Topology {} loaded {} schema(s) from {} log entries",
            self.node_id,
            catalog.schemas().len(),
            entries.len()
        );
        *self.catalog.write() = Arc::new(catalog);
        *self.log_cursor.lock() = cursor;
        Ok(())
    }

    /// Identity of this node in notifications
    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// The committed catalog as of now
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    pub fn schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.snapshot().schema(name).cloned()
    }

    pub fn schemas(&self) -> Vec<Arc<Schema>> {
        self.snapshot().schemas().values().cloned().collect()
    }

    pub fn vertex_label(&self, id: &LabelId) -> Option<Arc<VertexLabel>> {
        self.snapshot().vertex_label(id).cloned()
    }

    pub fn edge_label(&self, id: &LabelId) -> Option<Arc<EdgeLabel>> {
        self.snapshot().edge_label(id).cloned()
    }

    pub fn foreign_keys(&self) -> ForeignKeyCache {
        self.snapshot().foreign_keys().clone()
    }

    /// Whether some transaction is changing structure right now
    pub fn is_schema_changing(&self) -> bool {
        self.gate.is_changing()
    }

    pub fn register_listener(&self, listener: Arc<dyn TopologyListener>) {
        self.listeners.register(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn TopologyListener>) -> bool {
        self.listeners.unregister(listener)
    }

    /// Highest meta log id applied to the catalog
    pub fn log_cursor(&self) -> i64 {
        *self.log_cursor.lock()
    }

    /// Start a database transaction
    pub fn begin(self: &Arc<Self>) -> TopologyResult<Transaction> {
        let conn = self.factory.connect()?;
        conn.begin()?;
        let id = TransactionId::from_u64(self.next_txn.fetch_add(1, Ordering::SeqCst));
        log::debug!("Began transaction {}", id);
        Ok(Transaction::new(Arc::clone(self), conn, id))
    }

    /// Apply a delta committed by another node. No DDL runs; the other node
    /// already changed the database. Returns the number of catalog changes.
    pub fn apply_remote_notification(&self, notification: &Notification) -> TopologyResult<usize> {
        if self.config.ignore_own_notifications && notification.origin == self.node_id {
            log::debug!("Ignoring own notification from {}", notification.timestamp);
            return Ok(0);
        }
        let changes = NotificationCodec::to_change_set(notification)?;
        let events = self.apply_remote(&changes)?;
        log::info!(
            "Applied notification from {}: {} change(s)",
            notification.origin,
            events.len()
        );
        self.fire(&events)?;
        Ok(events.len())
    }

    /// Apply log entries committed by other nodes since the last refresh
    pub fn refresh(&self) -> TopologyResult<usize> {
        let conn = self.factory.connect()?;
        let cursor = self.log_cursor();
        let mut applied = 0;
        for entry in self.meta.load_since(conn.as_ref(), cursor)? {
            if entry.notification.origin != self.node_id {
                let changes = NotificationCodec::to_change_set(&entry.notification)?;
                let events = self.apply_remote(&changes)?;
                applied += events.len();
                self.fire(&events)?;
            }
            let mut log_cursor = self.log_cursor.lock();
            *log_cursor = (*log_cursor).max(entry.id);
        }
        if applied > 0 {
            log::info!("Refresh applied {} change(s)", applied);
        }
        Ok(applied)
    }

    /// Compare the committed catalog with the live database
    pub fn validate_topology(&self) -> TopologyResult<Vec<TopologyValidationError>> {
        let conn = self.factory.connect()?;
        Ok(validate_catalog(&self.snapshot(), conn.as_ref(), self.dialect.as_ref())?)
    }

    /// Install read-only copies of schemas owned by another topology.
    /// A previously imported schema of the same name is replaced.
    pub fn import_foreign_schemas(&self, schemas: &[Arc<Schema>]) -> TopologyResult<usize> {
        let events = self.with_remote_gate(|catalog| {
            for schema in schemas {
                if catalog.schema(schema.name()).is_some_and(|s| !s.is_foreign()) {
                    return Err(TopologyError::AlreadyExists(format!("schema {}", schema.name())));
                }
            }
            let mut events = Vec::new();
            for schema in schemas {
                catalog.insert_schema(schema.as_foreign());
                events.push(TopologyEvent::create(TopologyElement::Schema(
                    schema.name().to_string(),
                )));
            }
            catalog.reindex_foreign_keys();
            Ok(events)
        })?;
        log::info!("Imported {} foreign schema(s)", events.len());
        self.fire(&events)?;
        Ok(events.len())
    }

    /// Remove every imported foreign schema
    pub fn clear_foreign_schemas(&self) -> TopologyResult<usize> {
        let events = self.with_remote_gate(|catalog| {
            let foreign: Vec<String> = catalog
                .schemas()
                .values()
                .filter(|schema| schema.is_foreign())
                .map(|schema| schema.name().to_string())
                .collect();
            for name in &foreign {
                catalog.remove_schema_entry(name);
            }
            catalog.reindex_foreign_keys();
            Ok(foreign
                .into_iter()
                .map(|name| TopologyEvent::delete(TopologyElement::Schema(name)))
                .collect())
        })?;
        self.fire(&events)?;
        Ok(events.len())
    }

    fn apply_remote(&self, changes: &ChangeSet) -> TopologyResult<Vec<TopologyEvent>> {
        self.with_remote_gate(|catalog| Ok(catalog.apply(changes)))
    }

    /// Run `f` on the committed catalog while holding the gate as a remote
    fn with_remote_gate<F>(&self, f: F) -> TopologyResult<Vec<TopologyEvent>>
    where
        F: FnOnce(&mut Catalog) -> TopologyResult<Vec<TopologyEvent>>,
    {
        let _remote = self.remote_lock.lock();
        self.gate
            .acquire(GateHolder::Remote, self.config.schema_change_timeout())?;
        let result = {
            let mut committed = self.catalog.write();
            let mut catalog = (**committed).clone();
            let result = f(&mut catalog);
            if matches!(&result, Ok(events) if !events.is_empty()) {
                *committed = Arc::new(catalog);
            }
            result
        };
        self.gate.release(GateHolder::Remote);
        result
    }

    fn fire(&self, events: &[TopologyEvent]) -> TopologyResult<()> {
        let failures = self.listeners.fire(events);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::ListenerFailed(failures))
        }
    }

    /// Take the gate for a transaction and hand it a working copy
    pub(crate) fn start_schema_change(&self, id: TransactionId) -> TopologyResult<SchemaWork> {
        self.gate
            .acquire(GateHolder::Transaction(id), self.config.schema_change_timeout())?;
        log::debug!("Transaction {} started a schema change", id);
        Ok(SchemaWork::new(self.snapshot()))
    }

    /// Commit the database transaction and, when it changed structure,
    /// merge its delta. The gate is released whatever happens.
    pub(crate) fn commit_transaction(
        &self,
        id: TransactionId,
        conn: &dyn SqlConnection,
        work: Option<SchemaWork>,
    ) -> TopologyResult<()> {
        let Some(work) = work else {
            return commit_or_rollback(conn);
        };
        let result = self.commit_schema_work(id, conn, &work);
        self.gate.release(GateHolder::Transaction(id));
        let (events, notification) = result?;

        let failures = self.listeners.fire(&events);
        if let (Some(notification), Some(publisher)) = (&notification, &self.publisher) {
            if self.config.publish_notifications {
                publisher
                    .publish(notification)
                    .map_err(|err| TopologyError::NotificationFailed(err.to_string()))?;
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TopologyError::ListenerFailed(failures))
        }
    }

    fn commit_schema_work(
        &self,
        id: TransactionId,
        conn: &dyn SqlConnection,
        work: &SchemaWork,
    ) -> TopologyResult<(Vec<TopologyEvent>, Option<Notification>)> {
        let changes = work.change_set();
        if changes.is_empty() {
            commit_or_rollback(conn)?;
            return Ok((Vec::new(), None));
        }
        let notification = NotificationCodec::from_change_set(self.node_id, &changes);
        if let Err(err) = self.meta.record(conn, &notification) {
            if let Err(rollback) = conn.rollback() {
                log::warn!("Rollback of {} failed: {}", id, rollback);
            }
            return Err(err);
        }
        commit_or_rollback(conn)?;

        let events = {
            let mut committed = self.catalog.write();
            Arc::make_mut(&mut *committed).apply(&changes)
        };
        log::info!(
            "Transaction {} committed {} label change(s), {} event(s)",
            id,
            changes.label_count(),
            events.len()
        );
        Ok((events, Some(notification)))
    }

    /// Roll back the database transaction and drop any structural work
    pub(crate) fn rollback_transaction(
        &self,
        id: TransactionId,
        conn: &dyn SqlConnection,
        had_schema_work: bool,
    ) -> TopologyResult<()> {
        let result = conn.rollback();
        if had_schema_work {
            self.gate.release(GateHolder::Transaction(id));
            log::info!("Transaction {} rolled back its schema changes", id);
        }
        Ok(result?)
    }
}

fn commit_or_rollback(conn: &dyn SqlConnection) -> TopologyResult<()> {
    if let Err(err) = conn.commit() {
        if let Err(rollback) = conn.rollback() {
            log::warn!("Rollback after failed commit failed: {}", rollback);
        }
        return Err(err.into());
    }
    Ok(())
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("node_id", &self.node_id)
            .field("dialect", &self.dialect.name())
            .field("schemas", &self.snapshot().schemas().len())
            .finish()
    }
}
