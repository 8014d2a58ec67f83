// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SqlGraph - a transactional topology engine for SQL-backed graph stores
//!
//! SqlGraph keeps the schema of a graph stored in relational tables: schemas,
//! vertex labels, edge labels, the edge roles binding them together, and the
//! typed property columns of every label. Structural changes are part of the
//! surrounding database transaction and stay private to it until commit.
//!
//! # Features
//!
//! - **Transactional DDL**: every structural change is visible only to the
//!   transaction that made it until that transaction commits
//! - **Polymorphic edges**: one edge label may connect many vertex labels,
//!   with a multiplicity per edge role
//! - **Constraint generation**: multiplicities turn into NOT NULL, CHECK and
//!   UNIQUE constraints on the underlying tables
//! - **Replication**: each commit is broadcast as a delta that remote
//!   topologies replay idempotently
//!
//! # Usage
//!
//! ```ignore
//! use sqlgraph::{properties, PropertyDefinition, PropertyType, Topology};
//! use sqlgraph::sql::sqlite::{SqliteConnectionFactory, SqliteDialect};
//!
//! let topology = Topology::builder(SqliteConnectionFactory::new("graph.db"), SqliteDialect::new())
//!     .build()?;
//! let mut tx = topology.begin()?;
//! tx.ensure_vertex_label_exist(
//!     "public",
//!     "Person",
//!     properties([("name", PropertyDefinition::of(PropertyType::String))]),
//! )?;
//! tx.commit()?;
//! ```

pub mod config;
pub mod graph;
pub mod meta;
pub mod notify;
pub mod sql;
pub mod topology;
pub mod txn;

pub use config::TopologyConfig;
pub use graph::VertexRef;
pub use topology::{
    properties, AbstractLabel, Catalog, Direction, EdgeDefinition, EdgeLabel, EdgeRemoveType,
    EdgeRole, Index, IndexType, LabelId, LabelKind, ListenerError, Multiplicity, Partition,
    PartitionType, PropertyColumn, PropertyDefinition, PropertyType, Schema, Topology,
    TopologyBuilder, TopologyChangeAction, TopologyElement, TopologyError, TopologyEvent,
    TopologyListener, TopologyResult, TopologyValidationError, VertexLabel,
};
pub use txn::{Transaction, TransactionId, TransactionStatus};

/// SqlGraph version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SqlGraph crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
