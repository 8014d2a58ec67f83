// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Edge roles: the participation of one vertex label in one edge label

use super::label::LabelId;
use super::multiplicity::Multiplicity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an edge a vertex label sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Suffix of the foreign key columns an edge table holds for this side
    pub fn foreign_key_suffix(&self) -> &'static str {
        match self {
            Direction::In => "__I",
            Direction::Out => "__O",
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

/// What a role removal did to the edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeRemoveType {
    /// The whole edge label went away with the role
    EdgeLabel,
    /// Only the role was detached
    EdgeRole,
}

/// Binds a vertex label to an edge label in one direction.
///
/// Roles hold ids, not references. They live in the vertex label's role
/// maps; the edge label only records which vertex labels point at it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRole {
    vertex_label: LabelId,
    edge_label: LabelId,
    direction: Direction,
    multiplicity: Multiplicity,
}

impl EdgeRole {
    pub fn new(
        vertex_label: LabelId,
        edge_label: LabelId,
        direction: Direction,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            vertex_label,
            edge_label,
            direction,
            multiplicity,
        }
    }

    pub fn vertex_label(&self) -> &LabelId {
        &self.vertex_label
    }

    pub fn edge_label(&self) -> &LabelId {
        &self.edge_label
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    /// Name used in logs and error messages
    pub fn name(&self) -> String {
        match self.direction {
            Direction::Out => format!("{}-[{}]->", self.vertex_label, self.edge_label),
            Direction::In => format!("-[{}]->{}", self.edge_label, self.vertex_label),
        }
    }

    pub(crate) fn with_vertex_label(&self, vertex_label: LabelId) -> Self {
        Self {
            vertex_label,
            ..self.clone()
        }
    }

    pub(crate) fn with_edge_label(&self, edge_label: LabelId) -> Self {
        Self {
            edge_label,
            ..self.clone()
        }
    }
}

impl fmt::Display for EdgeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.multiplicity)
    }
}
