//! Generation prompt construction from a schema and column statistics.

use nlq_schema::{ColumnStatistic, Schema};
use std::collections::BTreeMap;

/// How many categorical values are listed inline before the line falls
/// back to a distinct-value count.
const MAX_LISTED_VALUES: usize = 10;

/// Fixed prompt template. `{table}`, `{columns}`, `{statistics}` and
/// `{question}` are substituted at build time.
const PROMPT_TEMPLATE: &str = r#"You are an expert at converting natural language questions into SQL queries for a single table.

Table: {table}

Columns:
{columns}

Column statistics:
{statistics}

Rules:
1. Generate exactly ONE SELECT statement against the {table} table.
2. Never modify data: no INSERT, UPDATE, DELETE, DROP, ALTER or any other non-SELECT statement.
3. Use only the columns listed above.
4. Booleans are stored as integers: 1 for true, 0 for false.
5. Return ONLY the SQL query in a ```sql fenced block, with no explanation.

Question: {question}"#;

/// Substitute schema, statistics, table name and question into the
/// template. One line per attribute, one line per statistic.
pub fn build_prompt(
    question: &str,
    schema: &Schema,
    statistics: &BTreeMap<String, ColumnStatistic>,
    table: &str,
) -> String {
    let columns = schema
        .attributes
        .iter()
        .map(|attr| {
            format!(
                "- {} ({}): {}",
                attr.name,
                attr.primitive.as_str(),
                attr.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let statistics = if statistics.is_empty() {
        "- (no statistics available)".to_string()
    } else {
        statistics
            .iter()
            .map(|(name, statistic)| format!("- {}: {}", name, format_statistic(statistic)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    PROMPT_TEMPLATE
        .replace("{table}", table)
        .replace("{columns}", &columns)
        .replace("{statistics}", &statistics)
        .replace("{question}", question)
}

fn format_statistic(statistic: &ColumnStatistic) -> String {
    match statistic {
        ColumnStatistic::Numeric { min, max, mean, .. } => {
            format!("range {min} to {max}, average {mean}")
        }
        ColumnStatistic::Categorical { values, count } => {
            if values.len() <= MAX_LISTED_VALUES {
                let listed = values
                    .iter()
                    .map(display_value)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("values: {listed}")
            } else {
                format!("{count} unique total")
            }
        }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
