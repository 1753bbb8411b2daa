//! Result post-processing: boolean rehydration and result metadata.
//!
//! Booleans are stored as INTEGER 0/1 and the storage layer has no memory
//! of which columns were declared boolean. Rehydration is a naming-
//! convention policy over column names; columns outside the convention
//! keep their 0/1 integers. Deriving boolean-ness from the declared schema
//! instead is an open question tracked in DESIGN.md.

use crate::QueryResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BOOLEAN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(is_|has_|can_|should_|will_|was_|were_)|(_flag|_enabled|_disabled|_active|_visible)$",
    )
    .unwrap()
});

/// Column type inferred from returned rows, independent of the declared
/// schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Null,
    String,
    Integer,
    Number,
    Boolean,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub data_type: InferredType,
    pub nullable: bool,
}

/// Reinterpret 0/1 integers as booleans for columns whose names follow the
/// boolean naming convention. All other values pass through unchanged.
pub fn format_results(rows: &mut [serde_json::Map<String, serde_json::Value>]) {
    for row in rows.iter_mut() {
        for (name, value) in row.iter_mut() {
            if !BOOLEAN_NAME.is_match(name) {
                continue;
            }
            if let Some(i) = value.as_i64() {
                if i == 0 || i == 1 {
                    *value = serde_json::Value::Bool(i == 1);
                }
            }
        }
    }
}

/// Infer per-column metadata from returned rows.
///
/// The type comes from the first row's value; the nullable flag is set when
/// any row holds null in that column. Zero rows produce empty metadata.
/// Inference degrades to `unknown` rather than failing.
pub fn result_metadata(result: &QueryResult) -> BTreeMap<String, ColumnMeta> {
    let mut metadata = BTreeMap::new();
    let Some(first) = result.rows.first() else {
        return metadata;
    };

    for (name, value) in first {
        let data_type = infer_type(value);
        let nullable = result.rows.iter().any(|row| {
            row.get(name).map_or(true, serde_json::Value::is_null)
        });
        metadata.insert(name.clone(), ColumnMeta { data_type, nullable });
    }
    metadata
}

fn infer_type(value: &serde_json::Value) -> InferredType {
    match value {
        serde_json::Value::Null => InferredType::Null,
        serde_json::Value::Bool(_) => InferredType::Boolean,
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                InferredType::Integer
            } else {
                InferredType::Number
            }
        }
        serde_json::Value::String(_) => InferredType::String,
        _ => InferredType::Unknown,
    }
}
