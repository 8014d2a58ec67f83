// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Topology of a SQL-backed graph
//!
//! This module holds the structural model of the graph and the engine that
//! keeps it consistent with the database.
//!
//! # Features
//! - Schemas, vertex labels, edge labels and typed property columns
//! - Edge roles with multiplicities, turned into constraints and indexes
//! - Copy-on-write catalog with private per-transaction working copies
//! - Schema-change gate serializing structural writers
//! - Listeners notified of every committed structural change
//! - Drift detection against the live database

pub mod catalog;
pub mod change_set;
pub mod edge_label;
pub mod edge_role;
pub(crate) mod editor;
pub mod engine;
pub mod error;
pub mod foreign_key;
pub mod gate;
pub mod label;
pub mod listener;
pub mod multiplicity;
pub mod property;
pub mod schema;
pub mod validation;
pub mod vertex_label;

pub use catalog::Catalog;
pub use change_set::{ChangeSet, LabelDelta, LabelHeader, SchemaDelta};
pub use edge_label::EdgeLabel;
pub use edge_role::{Direction, EdgeRemoveType, EdgeRole};
pub use engine::{Topology, TopologyBuilder};
pub use error::{TopologyError, TopologyResult};
pub use foreign_key::{ForeignKey, ForeignKeyCache};
pub use gate::{GateHolder, SchemaChangeGate};
pub use label::{
    AbstractLabel, Index, IndexType, Label, LabelId, LabelKind, Partition, PartitionType,
};
pub use listener::{
    ListenerError, TopologyChangeAction, TopologyElement, TopologyEvent, TopologyListener,
};
pub use multiplicity::{EdgeDefinition, Multiplicity};
pub use property::{properties, PropertyColumn, PropertyDefinition, PropertyType};
pub use schema::Schema;
pub use validation::{TopologyValidationError, ValidationIssue};
pub use vertex_label::VertexLabel;
