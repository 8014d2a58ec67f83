// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cardinality bounds for properties and edge roles

use super::error::{TopologyError, TopologyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bound value meaning "no limit"
pub const UNBOUNDED: i64 = -1;

/// Cardinality bound `[lower, upper]` where `-1` means unbounded.
///
/// On a property the bounds describe how many values a row may carry
/// (`lower > 0` makes the column required). On an edge role they describe
/// how many edges of that label a single vertex may have in that direction.
/// `unique` asks for set semantics on many-valued roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMultiplicity")]
pub struct Multiplicity {
    lower: i64,
    upper: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    unique: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Deserialize)]
struct RawMultiplicity {
    lower: i64,
    upper: i64,
    #[serde(default)]
    unique: bool,
}

impl TryFrom<RawMultiplicity> for Multiplicity {
    type Error = TopologyError;

    fn try_from(raw: RawMultiplicity) -> Result<Self, Self::Error> {
        Multiplicity::new(raw.lower, raw.upper, raw.unique)
    }
}

impl Multiplicity {
    /// Create a multiplicity, failing if either bound is below `-1`
    pub fn new(lower: i64, upper: i64, unique: bool) -> TopologyResult<Self> {
        if lower < UNBOUNDED {
            return Err(TopologyError::InvalidArgument(format!(
                "Multiplicity lower bound must be >= -1, got {}",
                lower
            )));
        }
        if upper < UNBOUNDED {
            return Err(TopologyError::InvalidArgument(format!(
                "Multiplicity upper bound must be >= -1, got {}",
                upper
            )));
        }
        Ok(Self {
            lower,
            upper,
            unique,
        })
    }

    /// Create a non-unique multiplicity
    pub fn of(lower: i64, upper: i64) -> TopologyResult<Self> {
        Self::new(lower, upper, false)
    }

    /// `(0, 1)`: optional single value
    pub const fn optional() -> Self {
        Self {
            lower: 0,
            upper: 1,
            unique: false,
        }
    }

    /// `(1, 1)`: exactly one value
    pub const fn required() -> Self {
        Self {
            lower: 1,
            upper: 1,
            unique: false,
        }
    }

    /// `(0, -1)`: any number of values
    pub const fn many() -> Self {
        Self {
            lower: 0,
            upper: UNBOUNDED,
            unique: false,
        }
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.upper
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Same bounds with set semantics
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn is_many(&self) -> bool {
        self.upper > 1 || self.upper == UNBOUNDED
    }

    pub fn is_required(&self) -> bool {
        self.lower > 0
    }

    /// Whether a cardinality check constraint can be generated
    pub fn has_limits(&self) -> bool {
        self.lower > 0 || self.upper != UNBOUNDED
    }

    /// Cardinality check using the SQL standard `CARDINALITY` function
    pub fn to_check_constraint(&self, column: &str) -> TopologyResult<String> {
        self.to_check_constraint_with("CARDINALITY", column)
    }

    /// Cardinality check using a dialect specific length function.
    ///
    /// `column` must already be quoted by the caller.
    pub fn to_check_constraint_with(
        &self,
        cardinality_function: &str,
        column: &str,
    ) -> TopologyResult<String> {
        if !self.has_limits() {
            return Err(TopologyError::InvalidArgument(format!(
                "Multiplicity {} has no limits to check",
                self
            )));
        }
        let length = format!("{}({})", cardinality_function, column);
        let mut clauses = Vec::new();
        if self.lower > 0 {
            clauses.push(format!("({} >= {})", length, self.lower));
        }
        if self.upper != UNBOUNDED {
            clauses.push(format!("({} <= {})", length, self.upper));
        }
        Ok(format!("({})", clauses.join(" AND ")))
    }

    pub fn to_notify_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }

    pub fn from_notify_json(json: &serde_json::Value) -> TopologyResult<Self> {
        Ok(serde_json::from_value(json.clone())?)
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::optional()
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: i64| {
            if b == UNBOUNDED {
                "*".to_string()
            } else {
                b.to_string()
            }
        };
        write!(f, "[{}..{}]", bound(self.lower), bound(self.upper))?;
        if self.unique {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// Multiplicities of the two roles created together with an edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Edges per out vertex
    pub out_multiplicity: Multiplicity,
    /// Edges per in vertex
    pub in_multiplicity: Multiplicity,
}

impl EdgeDefinition {
    pub fn of(out_multiplicity: Multiplicity, in_multiplicity: Multiplicity) -> Self {
        Self {
            out_multiplicity,
            in_multiplicity,
        }
    }

    /// Unconstrained many-to-many edge
    pub fn many_to_many() -> Self {
        Self::of(Multiplicity::many(), Multiplicity::many())
    }
}
