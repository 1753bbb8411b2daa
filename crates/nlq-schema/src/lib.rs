//! Data model for NLQ: table schemas, primitive/storage type mapping,
//! and column statistics.
//!
//! A [`Schema`] describes the single table a natural-language question is
//! asked against. It is produced by the ingestion collaborator and passed
//! here by reference; nothing in this workspace mutates it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema '{0}' has no attributes")]
    NoAttributes(String),

    #[error("required attribute '{0}' is not declared in the schema")]
    UnknownRequired(String),

    #[error("attribute '{0}' has no example values")]
    NoExamples(String),
}

/// Primitive attribute types a schema may declare.
///
/// Anything else coming in from untyped input is treated as `string`
/// (see [`ColumnType::for_declared`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
        }
    }
}

/// A named, typed field in a [`Schema`], with the description and example
/// values used to prompt the translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub primitive: PrimitiveType,
    pub description: String,
    pub examples: Vec<serde_json::Value>,
}

/// Schema for a single table: ordered attributes plus the required subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub title: String,
    pub description: String,
    /// Attribute order is meaningful: it drives both column order in the
    /// stored table and line order in the generation prompt.
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Schema {
    /// Check the structural invariants: at least one attribute, every
    /// required name declared, every attribute carrying examples.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.attributes.is_empty() {
            return Err(SchemaError::NoAttributes(self.title.clone()));
        }
        for name in &self.required {
            if self.attribute(name).is_none() {
                return Err(SchemaError::UnknownRequired(name.clone()));
            }
        }
        for attr in &self.attributes {
            if attr.examples.is_empty() {
                return Err(SchemaError::NoExamples(attr.name.clone()));
            }
        }
        Ok(())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}

/// Storage column types the table layer understands.
///
/// Booleans are stored as INTEGER 0/1, so the boolean origin of a column is
/// lost at this layer; the result formatter reconstructs it heuristically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Real,
    Integer,
}

impl ColumnType {
    /// Map a primitive schema type to its storage type. Total.
    pub fn for_primitive(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::String => ColumnType::Text,
            PrimitiveType::Number => ColumnType::Real,
            PrimitiveType::Integer | PrimitiveType::Boolean => ColumnType::Integer,
        }
    }

    /// Map a declared type name (possibly from untyped input) to a storage
    /// type. Unknown names fall back to TEXT rather than failing.
    pub fn for_declared(declared: &str) -> Self {
        match declared.to_ascii_lowercase().as_str() {
            "number" => ColumnType::Real,
            "integer" | "boolean" => ColumnType::Integer,
            _ => ColumnType::Text,
        }
    }

    /// Reverse mapping, used when reconciling introspected storage types
    /// against the schema. Unknown storage types map to `string`.
    pub fn primitive_for(storage: &str) -> PrimitiveType {
        match storage.to_ascii_uppercase().as_str() {
            "INTEGER" | "BIGINT" | "INT" | "SMALLINT" | "TINYINT" => PrimitiveType::Integer,
            "REAL" | "DOUBLE" | "FLOAT" | "DECIMAL" => PrimitiveType::Number,
            _ => PrimitiveType::String,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
        }
    }
}

/// Per-column profile computed from stored data.
///
/// Computed fresh on every request and never cached: a concurrent writer
/// makes any previously computed profile stale, and this layer does not
/// track staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnStatistic {
    Numeric {
        min: f64,
        max: f64,
        mean: f64,
        count: u64,
    },
    Categorical {
        /// Distinct non-null values, sorted, capped at 100. When the cap
        /// is hit, `count` reflects the returned values only.
        values: Vec<serde_json::Value>,
        count: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> Schema {
        Schema {
            title: "hotels".to_string(),
            description: "Hotels in the catalog".to_string(),
            attributes: vec![
                Attribute {
                    name: "name".to_string(),
                    primitive: PrimitiveType::String,
                    description: "Hotel name".to_string(),
                    examples: vec![json!("Grand Plaza")],
                },
                Attribute {
                    name: "rating".to_string(),
                    primitive: PrimitiveType::Number,
                    description: "Star rating".to_string(),
                    examples: vec![json!(4.5)],
                },
            ],
            required: vec!["name".to_string()],
        }
    }

    #[test]
    fn valid_schema_passes() {
        assert!(sample_schema().validate().is_ok());
    }

    #[test]
    fn empty_schema_rejected() {
        let mut schema = sample_schema();
        schema.attributes.clear();
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::NoAttributes(_))
        ));
    }

    #[test]
    fn unknown_required_rejected() {
        let mut schema = sample_schema();
        schema.required.push("price".to_string());
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::UnknownRequired(name)) if name == "price"
        ));
    }

    #[test]
    fn attribute_without_examples_rejected() {
        let mut schema = sample_schema();
        schema.attributes[0].examples.clear();
        assert!(matches!(schema.validate(), Err(SchemaError::NoExamples(_))));
    }

    #[test]
    fn primitive_to_storage_mapping() {
        assert_eq!(
            ColumnType::for_primitive(PrimitiveType::String),
            ColumnType::Text
        );
        assert_eq!(
            ColumnType::for_primitive(PrimitiveType::Number),
            ColumnType::Real
        );
        assert_eq!(
            ColumnType::for_primitive(PrimitiveType::Integer),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::for_primitive(PrimitiveType::Boolean),
            ColumnType::Integer
        );
    }

    #[test]
    fn unknown_declared_type_falls_back_to_text() {
        assert_eq!(ColumnType::for_declared("datetime"), ColumnType::Text);
        assert_eq!(ColumnType::for_declared(""), ColumnType::Text);
        assert_eq!(ColumnType::for_declared("Integer"), ColumnType::Integer);
    }

    #[test]
    fn storage_to_primitive_mapping() {
        assert_eq!(ColumnType::primitive_for("INTEGER"), PrimitiveType::Integer);
        assert_eq!(ColumnType::primitive_for("real"), PrimitiveType::Number);
        assert_eq!(ColumnType::primitive_for("TEXT"), PrimitiveType::String);
        assert_eq!(ColumnType::primitive_for("VARCHAR"), PrimitiveType::String);
    }

    #[test]
    fn schema_round_trips_through_json() {
        let schema = sample_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attributes.len(), 2);
        assert_eq!(back.attributes[1].primitive, PrimitiveType::Number);
        assert_eq!(back.required, vec!["name"]);
    }
}
