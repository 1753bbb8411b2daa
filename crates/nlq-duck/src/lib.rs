//! DuckDB executor for validated SELECT statements.
//!
//! The executor owns a single shared connection handle with an explicit
//! open/closed state: [`Executor::open`] returns a live handle, every
//! operation requires it, and [`Executor::close`] permanently invalidates
//! it. No internal locking or timeout is provided; concurrent writers
//! outside this engine can make in-flight reads and previously computed
//! statistics stale.
//!
//! This layer assumes only validated SELECT statements are submitted.
//! Statements that passed validation but fail at runtime surface as
//! [`ExecutionError::Database`] and propagate without retry.

use duckdb::types::ValueRef;
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub mod format;
pub mod stats;

pub use format::{result_metadata, ColumnMeta, InferredType};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("connection is closed")]
    Closed,

    #[error("invalid parameter: {0}")]
    Parameter(String),
}

/// Pagination fields attached to a paginated [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u64,
    pub page_size: u64,
    pub total_rows: u64,
    pub total_pages: u64,
    pub has_more: bool,
    pub has_previous: bool,
}

/// Materialized result of a query: ordered rows of column → scalar-or-null,
/// the echoed SQL, and pagination fields when the query was paginated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
}

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Page and page size must be requested together; either alone is a
    /// parameter error.
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Values bound to `?` placeholders, in order.
    pub params: Vec<serde_json::Value>,
    /// Apply boolean rehydration to the returned rows.
    pub format: bool,
}

pub struct Executor {
    conn: Option<Connection>,
}

impl Executor {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn: Some(conn) })
    }

    pub fn open_in_memory() -> Result<Self, ExecutionError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Some(conn) })
    }

    /// Close the handle. Every later operation fails with
    /// [`ExecutionError::Closed`]. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), ExecutionError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| ExecutionError::Database(e))?;
        }
        Ok(())
    }

    /// Borrow the live connection, for callers that need to set up tables.
    pub fn connection(&self) -> Result<&Connection, ExecutionError> {
        self.conn.as_ref().ok_or(ExecutionError::Closed)
    }

    /// Execute a validated SELECT statement.
    pub fn execute(&self, sql: &str, options: &ExecuteOptions) -> Result<QueryResult, ExecutionError> {
        let effective_sql = match (options.page, options.page_size) {
            (None, None) => sql.to_string(),
            (Some(page), Some(page_size)) => inject_pagination(sql, page, page_size)?,
            _ => {
                return Err(ExecutionError::Parameter(
                    "page and page_size must be provided together".to_string(),
                ));
            }
        };

        let mut rows = self.run_query(&effective_sql, &options.params)?;
        if options.format {
            format::format_results(&mut rows);
        }

        let row_count = rows.len();
        debug!(sql = %effective_sql, rows = row_count, "query executed");
        Ok(QueryResult {
            rows,
            row_count,
            sql: effective_sql,
            page_info: None,
        })
    }

    /// Execute one page of a query and report its position in the full
    /// result set.
    ///
    /// The total row count comes from wrapping the original query in
    /// `SELECT COUNT(*) FROM (...)`. When that COUNT query itself fails the
    /// total degrades to 0 with a warning instead of failing the call; a
    /// failure of the page query itself still propagates.
    pub fn paginate(&self, sql: &str, page: u64, page_size: u64) -> Result<QueryResult, ExecutionError> {
        check_page_params(page, page_size)?;

        let page_sql = inject_pagination(sql, page, page_size)?;
        let rows = self.run_query(&page_sql, &[])?;

        let total_rows = match self.count(sql) {
            Ok(n) => n,
            Err(e) => {
                warn!(sql, error = %e, "COUNT query failed, reporting total_rows = 0");
                0
            }
        };
        let total_pages = total_rows.div_ceil(page_size);

        let row_count = rows.len();
        Ok(QueryResult {
            rows,
            row_count,
            sql: page_sql,
            page_info: Some(PageInfo {
                page,
                page_size,
                total_rows,
                total_pages,
                has_more: page < total_pages,
                has_previous: page > 1,
            }),
        })
    }

    /// Number of rows the query would return, via a COUNT(*) wrap.
    pub fn count(&self, sql: &str) -> Result<u64, ExecutionError> {
        let count_sql = format!("SELECT COUNT(*) FROM ({})", strip_trailing_semicolon(sql));
        let n: i64 = self
            .connection()?
            .query_row(&count_sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// First row of the result, or `None` when the query matches nothing.
    pub fn execute_one(
        &self,
        sql: &str,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, ExecutionError> {
        let result = self.execute(sql, &ExecuteOptions::default())?;
        Ok(result.rows.into_iter().next())
    }

    pub fn has_results(&self, sql: &str) -> Result<bool, ExecutionError> {
        Ok(self.execute_one(sql)?.is_some())
    }

    /// Execute with boolean rehydration applied to the rows.
    pub fn execute_and_format(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        self.execute(
            sql,
            &ExecuteOptions {
                format: true,
                ..Default::default()
            },
        )
    }

    /// Paginate with boolean rehydration applied to the rows.
    pub fn execute_with_pagination(
        &self,
        sql: &str,
        page: u64,
        page_size: u64,
    ) -> Result<QueryResult, ExecutionError> {
        let mut result = self.paginate(sql, page, page_size)?;
        format::format_results(&mut result.rows);
        Ok(result)
    }

    /// Column names and storage types for a table, in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>, ExecutionError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT column_name, data_type \
             FROM information_schema.columns \
             WHERE table_name = ? \
             ORDER BY ordinal_position",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn run_query(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, ExecutionError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;

        let bound: Vec<duckdb::types::Value> = params.iter().map(json_to_param).collect();
        let mut rows = stmt.query(duckdb::params_from_iter(bound))?;

        let mut columns: Vec<String> = Vec::new();
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            if columns.is_empty() {
                let count = row.as_ref().column_count();
                for i in 0..count {
                    columns.push(row.as_ref().column_name(i)?.to_string());
                }
            }
            let mut row_map = serde_json::Map::new();
            for (i, name) in columns.iter().enumerate() {
                row_map.insert(name.clone(), value_to_json(row.get_ref(i)?));
            }
            out.push(row_map);
        }

        Ok(out)
    }
}

fn check_page_params(page: u64, page_size: u64) -> Result<(), ExecutionError> {
    if page < 1 {
        return Err(ExecutionError::Parameter(format!(
            "page must be >= 1, got {page}"
        )));
    }
    if page_size < 1 {
        return Err(ExecutionError::Parameter(format!(
            "page_size must be >= 1, got {page_size}"
        )));
    }
    Ok(())
}

fn inject_pagination(sql: &str, page: u64, page_size: u64) -> Result<String, ExecutionError> {
    check_page_params(page, page_size)?;
    let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
        ExecutionError::Parameter(format!(
            "page {page} with page_size {page_size} overflows the row offset"
        ))
    })?;
    Ok(format!(
        "{} LIMIT {} OFFSET {}",
        strip_trailing_semicolon(sql),
        page_size,
        offset
    ))
}

fn strip_trailing_semicolon(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Map a JSON parameter to a DuckDB value for binding.
fn json_to_param(value: &serde_json::Value) -> duckdb::types::Value {
    use duckdb::types::Value;
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(i)
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

/// Convert a DuckDB cell to a JSON scalar.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(i) => serde_json::json!(i),
        ValueRef::SmallInt(i) => serde_json::json!(i),
        ValueRef::Int(i) => serde_json::json!(i),
        ValueRef::BigInt(i) => serde_json::json!(i),
        // HUGEINT shows up in aggregates (SUM over integer columns). JSON
        // numbers cannot hold the full i128 range, so wide values become
        // strings instead of panicking inside json!.
        ValueRef::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => serde_json::json!(v),
            Err(_) => serde_json::Value::String(i.to_string()),
        },
        ValueRef::UTinyInt(i) => serde_json::json!(i),
        ValueRef::USmallInt(i) => serde_json::json!(i),
        ValueRef::UInt(i) => serde_json::json!(i),
        ValueRef::UBigInt(i) => serde_json::json!(i),
        ValueRef::Float(f) => serde_json::json!(f),
        ValueRef::Double(f) => serde_json::json!(f),
        ValueRef::Text(s) => serde_json::Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
        _ => serde_json::Value::String("<unsupported>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_injection() {
        assert_eq!(
            inject_pagination("SELECT * FROM t;", 1, 10).unwrap(),
            "SELECT * FROM t LIMIT 10 OFFSET 0"
        );
        assert_eq!(
            inject_pagination("SELECT * FROM t", 3, 5).unwrap(),
            "SELECT * FROM t LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn pagination_params_validated() {
        assert!(matches!(
            inject_pagination("SELECT * FROM t", 0, 10),
            Err(ExecutionError::Parameter(_))
        ));
        assert!(matches!(
            inject_pagination("SELECT * FROM t", 1, 0),
            Err(ExecutionError::Parameter(_))
        ));
    }

    #[test]
    fn pagination_offset_overflow_is_a_parameter_error() {
        assert!(matches!(
            inject_pagination("SELECT * FROM t", u64::MAX, 2),
            Err(ExecutionError::Parameter(_))
        ));
    }

    #[test]
    fn page_without_page_size_is_a_parameter_error() {
        let executor = Executor::open_in_memory().unwrap();
        let options = ExecuteOptions {
            page: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            executor.execute("SELECT 1", &options),
            Err(ExecutionError::Parameter(_))
        ));
    }

    #[test]
    fn json_params_map_to_duckdb_values() {
        use duckdb::types::Value;
        assert_eq!(json_to_param(&serde_json::json!(null)), Value::Null);
        assert_eq!(json_to_param(&serde_json::json!(true)), Value::Boolean(true));
        assert_eq!(json_to_param(&serde_json::json!(42)), Value::BigInt(42));
        assert_eq!(json_to_param(&serde_json::json!(1.5)), Value::Double(1.5));
        assert_eq!(
            json_to_param(&serde_json::json!("x")),
            Value::Text("x".to_string())
        );
    }

    #[test]
    fn closed_handle_is_a_dedicated_error() {
        let mut executor = Executor::open_in_memory().unwrap();
        executor.close().unwrap();
        assert!(matches!(
            executor.execute("SELECT 1", &ExecuteOptions::default()),
            Err(ExecutionError::Closed)
        ));
        assert!(matches!(executor.count("SELECT 1"), Err(ExecutionError::Closed)));
        // Closing twice is harmless.
        assert!(executor.close().is_ok());
    }
}
