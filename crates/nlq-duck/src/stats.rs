//! Column statistics computed from stored data.
//!
//! Statistics are recomputed on every request and never cached. That keeps
//! the engine trivially correct under writes from this process; writes from
//! concurrent processes can still make a returned profile stale the moment
//! it is produced, which callers must tolerate.

use crate::{value_to_json, ExecutionError, Executor};
use nlq_schema::{ColumnStatistic, ColumnType, PrimitiveType};
use std::collections::BTreeMap;

/// The auto-generated primary key, excluded from statistics.
const ID_COLUMN: &str = "id";

/// Distinct-value cap for categorical columns. Beyond the cap the reported
/// count silently reflects the returned values only.
const CATEGORICAL_CAP: usize = 100;

impl Executor {
    /// Profile every stored column of `table` except the identifier column.
    ///
    /// Numeric storage types get a min/max/mean/count summary over non-null
    /// values; everything else gets up to [`CATEGORICAL_CAP`] distinct
    /// non-null values, sorted. Returns a complete map or an error, never a
    /// partial map.
    pub fn column_statistics(
        &self,
        table: &str,
    ) -> Result<BTreeMap<String, ColumnStatistic>, ExecutionError> {
        let mut statistics = BTreeMap::new();

        for (name, storage_type) in self.table_columns(table)? {
            if name == ID_COLUMN {
                continue;
            }
            let statistic = match ColumnType::primitive_for(&storage_type) {
                PrimitiveType::Integer | PrimitiveType::Number => {
                    self.numeric_statistic(table, &name)?
                }
                _ => self.categorical_statistic(table, &name)?,
            };
            statistics.insert(name, statistic);
        }

        Ok(statistics)
    }

    fn numeric_statistic(&self, table: &str, column: &str) -> Result<ColumnStatistic, ExecutionError> {
        let sql = format!(
            "SELECT CAST(MIN(\"{col}\") AS DOUBLE), CAST(MAX(\"{col}\") AS DOUBLE), \
             CAST(AVG(\"{col}\") AS DOUBLE), COUNT(\"{col}\") \
             FROM \"{table}\" WHERE \"{col}\" IS NOT NULL",
            col = column,
            table = table,
        );
        let (min, max, mean, count) = self.connection()?.query_row(&sql, [], |row| {
            Ok((
                row.get::<_, Option<f64>>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        Ok(ColumnStatistic::Numeric {
            min: min.unwrap_or(0.0),
            max: max.unwrap_or(0.0),
            mean: mean.unwrap_or(0.0),
            count: count.max(0) as u64,
        })
    }

    fn categorical_statistic(
        &self,
        table: &str,
        column: &str,
    ) -> Result<ColumnStatistic, ExecutionError> {
        let sql = format!(
            "SELECT DISTINCT \"{col}\" FROM \"{table}\" \
             WHERE \"{col}\" IS NOT NULL ORDER BY 1 LIMIT {cap}",
            col = column,
            table = table,
            cap = CATEGORICAL_CAP,
        );
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(value_to_json(row.get_ref(0)?));
        }

        Ok(ColumnStatistic::Categorical {
            count: values.len() as u64,
            values,
        })
    }
}
