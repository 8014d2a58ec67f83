// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Property types, definitions and columns

use super::editor::SchemaEditor;
use super::error::{TopologyError, TopologyResult};
use super::label::{AbstractLabel, LabelId, LabelKind};
use super::multiplicity::Multiplicity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Base type of a property column
///
/// Serialized by name. `Varchar` travels as `"VARCHAR"` without its length and
/// decodes back as `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PropertyType {
    Boolean,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    Varchar(u32),
    LocalDate,
    LocalDateTime,
    Json,
    ByteArray,
    BooleanArray,
    IntegerArray,
    LongArray,
    DoubleArray,
    StringArray,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Short => "SHORT",
            PropertyType::Integer => "INTEGER",
            PropertyType::Long => "LONG",
            PropertyType::Float => "FLOAT",
            PropertyType::Double => "DOUBLE",
            PropertyType::String => "STRING",
            PropertyType::Varchar(_) => "VARCHAR",
            PropertyType::LocalDate => "LOCALDATE",
            PropertyType::LocalDateTime => "LOCALDATETIME",
            PropertyType::Json => "JSON",
            PropertyType::ByteArray => "BYTE_ARRAY",
            PropertyType::BooleanArray => "BOOLEAN_ARRAY",
            PropertyType::IntegerArray => "INTEGER_ARRAY",
            PropertyType::LongArray => "LONG_ARRAY",
            PropertyType::DoubleArray => "DOUBLE_ARRAY",
            PropertyType::StringArray => "STRING_ARRAY",
        }
    }

    pub fn from_name(name: &str) -> TopologyResult<Self> {
        let property_type = match name {
            "BOOLEAN" => PropertyType::Boolean,
            "SHORT" => PropertyType::Short,
            "INTEGER" => PropertyType::Integer,
            "LONG" => PropertyType::Long,
            "FLOAT" => PropertyType::Float,
            "DOUBLE" => PropertyType::Double,
            "STRING" | "VARCHAR" => PropertyType::String,
            "LOCALDATE" => PropertyType::LocalDate,
            "LOCALDATETIME" => PropertyType::LocalDateTime,
            "JSON" => PropertyType::Json,
            "BYTE_ARRAY" => PropertyType::ByteArray,
            "BOOLEAN_ARRAY" => PropertyType::BooleanArray,
            "INTEGER_ARRAY" => PropertyType::IntegerArray,
            "LONG_ARRAY" => PropertyType::LongArray,
            "DOUBLE_ARRAY" => PropertyType::DoubleArray,
            "STRING_ARRAY" => PropertyType::StringArray,
            other => {
                return Err(TopologyError::InvalidArgument(format!(
                    "Unknown property type: {}",
                    other
                )))
            }
        };
        Ok(property_type)
    }

    /// Multi-valued types whose cardinality can be checked
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            PropertyType::BooleanArray
                | PropertyType::IntegerArray
                | PropertyType::LongArray
                | PropertyType::DoubleArray
                | PropertyType::StringArray
        )
    }

    /// Whether two types share a physical column representation
    pub fn is_compatible_with(&self, other: &PropertyType) -> bool {
        match (self, other) {
            (PropertyType::String, PropertyType::Varchar(_))
            | (PropertyType::Varchar(_), PropertyType::String) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Varchar(length) => write!(f, "VARCHAR({})", length),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl From<PropertyType> for String {
    fn from(property_type: PropertyType) -> Self {
        property_type.name().to_string()
    }
}

impl TryFrom<String> for PropertyType {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PropertyType::from_name(&value)
    }
}

/// Full definition of a property: its base type and its mutable constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub property_type: PropertyType,
    pub multiplicity: Multiplicity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_literal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_constraint: Option<String>,
}

impl PropertyDefinition {
    /// Definition with the default multiplicity for the type
    pub fn of(property_type: PropertyType) -> Self {
        let multiplicity = if property_type.is_array() {
            Multiplicity::many()
        } else {
            Multiplicity::optional()
        };
        Self {
            property_type,
            multiplicity,
            default_literal: None,
            check_constraint: None,
        }
    }

    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default_literal = Some(literal.into());
        self
    }

    pub fn with_check(mut self, constraint: impl Into<String>) -> Self {
        self.check_constraint = Some(constraint.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.multiplicity.is_required()
    }
}

/// A named, typed property owned by one label.
///
/// Equality follows identity: two columns are equal when name and base type
/// match, regardless of the current definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyColumn {
    name: String,
    definition: PropertyDefinition,
}

impl PropertyColumn {
    pub fn new(name: impl Into<String>, definition: PropertyDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.definition.property_type
    }

    pub fn definition(&self) -> &PropertyDefinition {
        &self.definition
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.definition.multiplicity
    }

    /// Whether every field of the definition matches
    pub fn same_definition(&self, other: &PropertyColumn) -> bool {
        self.definition == other.definition
    }

    /// Snapshot carrying a replacement definition.
    ///
    /// The base type cannot change.
    pub fn updated(&self, definition: PropertyDefinition) -> TopologyResult<Self> {
        if !self
            .definition
            .property_type
            .is_compatible_with(&definition.property_type)
        {
            return Err(TopologyError::PropertyTypeConflict {
                name: self.name.clone(),
                existing: self.definition.property_type,
                requested: definition.property_type,
            });
        }
        Ok(Self {
            name: self.name.clone(),
            definition,
        })
    }

    pub(crate) fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            definition: self.definition.clone(),
        }
    }
}

impl PartialEq for PropertyColumn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.definition.property_type == other.definition.property_type
    }
}

impl Eq for PropertyColumn {}

impl fmt::Display for PropertyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.definition.property_type)
    }
}

/// Build a property map from `(name, definition)` pairs
pub fn properties<I, S>(entries: I) -> BTreeMap<String, PropertyDefinition>
where
    I: IntoIterator<Item = (S, PropertyDefinition)>,
    S: Into<String>,
{
    entries
        .into_iter()
        .map(|(name, definition)| (name.into(), definition))
        .collect()
}

impl SchemaEditor<'_> {
    /// Replace the mutable part of a property definition: multiplicity,
    /// default and check constraint. The base type is fixed.
    pub(crate) fn update_property_definition(
        &mut self,
        kind: LabelKind,
        id: &LabelId,
        name: &str,
        definition: PropertyDefinition,
    ) -> TopologyResult<PropertyColumn> {
        let label = self.writable_label(kind, id)?;
        let current = label
            .property(name)
            .cloned()
            .ok_or_else(|| TopologyError::PropertyNotFound(format!("{}.{}", id, name)))?;
        if current.definition() == &definition {
            return Ok(current);
        }
        if label.identifiers().iter().any(|i| i == name) {
            return Err(TopologyError::IdentifierImmutable(format!("{}.{}", id, name)));
        }
        let updated = current.updated(definition)?;

        let table = label.table_name();
        let (old, new) = (current.definition(), updated.definition());
        self.execute_all(self.dialect.drop_constraint_statements(&id.schema, &table, name, old))?;
        self.execute_all(self.dialect.constraint_statements(&id.schema, &table, name, new)?)?;
        if old.default_literal != new.default_literal {
            self.execute_all(self.dialect.default_statements(
                &id.schema,
                &table,
                name,
                new.default_literal.as_deref(),
            ))?;
        }

        self.record(format!("update property {}.{} to {}", id, name, updated));
        self.core_mut(kind, id)?
            .properties
            .insert(name.to_string(), updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varchar_decodes_as_string() {
        let json = serde_json::to_string(&PropertyType::Varchar(100)).unwrap();
        assert_eq!(json, "\"VARCHAR\"");
        let decoded: PropertyType = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, PropertyType::String);
    }

    #[test]
    fn test_unknown_type_name_fails() {
        assert!(serde_json::from_str::<PropertyType>("\"GEOGRAPHY\"").is_err());
    }

    #[test]
    fn test_array_default_multiplicity() {
        let definition = PropertyDefinition::of(PropertyType::StringArray);
        assert!(definition.multiplicity.is_many());
        let scalar = PropertyDefinition::of(PropertyType::Integer);
        assert_eq!(scalar.multiplicity, Multiplicity::optional());
    }

    #[test]
    fn test_column_equality_ignores_definition() {
        let a = PropertyColumn::new("name", PropertyDefinition::of(PropertyType::String));
        let b = a
            .updated(
                PropertyDefinition::of(PropertyType::String).with_multiplicity(Multiplicity::required()),
            )
            .unwrap();
        assert_eq!(a, b);
        assert!(!a.same_definition(&b));
    }

    #[test]
    fn test_update_cannot_change_type() {
        let column = PropertyColumn::new("age", PropertyDefinition::of(PropertyType::Integer));
        let result = column.updated(PropertyDefinition::of(PropertyType::Long));
        assert!(matches!(
            result,
            Err(TopologyError::PropertyTypeConflict { .. })
        ));
    }

    #[test]
    fn test_definition_json_is_camel_case() {
        let definition = PropertyDefinition::of(PropertyType::String).with_default("'x'");
        let json = serde_json::to_value(&definition).unwrap();
        assert_eq!(json["propertyType"], "STRING");
        assert_eq!(json["defaultLiteral"], "'x'");
        assert!(json.get("checkConstraint").is_none());
    }
}
