//! Warehouse backend abstraction
//!
//! This module provides the connection layer the pipeline runs against:
//! - Redshift: the production warehouse, reached over the Postgres wire protocol
//! - DuckDB: an embedded warehouse for local runs and tests
//!
//! Both backends speak the same statement catalog (see [`crate::sql`]) in
//! their own [`Dialect`], and both implement the staging bulk load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "redshift-backend")]
pub mod redshift;

pub mod config;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "redshift-backend")]
pub use self::redshift::RedshiftBackend;

pub use config::{WarehouseBackendType, WarehouseConfig};

use crate::sql::{Dialect, WarehouseTable};
use crate::staging::{StagingCopy, StagingError};

/// Error type for warehouse operations
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Failed to connect to the warehouse
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Bulk load into a staging table failed
    #[error("Load into {table} failed: {message}")]
    LoadFailed { table: String, message: String },

    /// Staging source could not be read
    #[error("Staging source error: {0}")]
    Staging(#[from] StagingError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend not compiled into this build
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a column of the first row as an integer
    ///
    /// Accepts numbers and numeric text, since Redshift returns every value
    /// as text over the simple query protocol.
    pub fn first_i64(&self, column: &str) -> Option<i64> {
        match self.rows.first()?.get(column)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Warehouse backend trait
///
/// One implementation per warehouse engine. Every call is a blocking step
/// from the pipeline's point of view: the driver awaits each one before
/// issuing the next.
#[async_trait(?Send)]
pub trait Warehouse {
    /// SQL dialect spoken by this backend
    fn dialect(&self) -> Dialect;

    /// Get the backend type name ("redshift" or "duckdb")
    fn backend_type(&self) -> &'static str;

    /// Execute a statement that returns no rows
    ///
    /// # Returns
    /// Number of rows affected, 0 for DDL
    async fn execute(&self, sql: &str) -> WarehouseResult<u64>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> WarehouseResult<QueryResult>;

    /// Bulk-load JSON sources into a staging table
    ///
    /// # Returns
    /// Number of rows loaded, when the engine reports it
    async fn copy_into(&self, copy: &StagingCopy) -> WarehouseResult<u64>;

    /// Check if the warehouse is reachable
    async fn health_check(&self) -> WarehouseResult<bool>;

    /// Close the warehouse connection
    async fn close(&self) -> WarehouseResult<()>;
}

/// Row count of one warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: WarehouseTable,
    pub rows: i64,
}

/// Count the rows of every table, in table order
pub async fn table_counts<W>(warehouse: &W) -> WarehouseResult<Vec<TableCount>>
where
    W: Warehouse + ?Sized,
{
    let mut counts = Vec::with_capacity(WarehouseTable::ALL.len());

    for table in WarehouseTable::ALL {
        let result = warehouse
            .execute_query(&format!("SELECT COUNT(*) AS row_count FROM {}", table))
            .await?;
        let rows = result.first_i64("row_count").ok_or_else(|| {
            WarehouseError::QueryFailed(format!("No row count returned for {}", table))
        })?;
        counts.push(TableCount { table, rows });
    }

    Ok(counts)
}

/// Open the warehouse selected by the configuration
///
/// # Arguments
/// * `config` - Validated warehouse configuration
/// * `base_dir` - Directory relative DuckDB paths are resolved against
pub async fn open_warehouse(
    config: &WarehouseConfig,
    base_dir: &Path,
) -> WarehouseResult<Box<dyn Warehouse>> {
    match config.warehouse.backend {
        WarehouseBackendType::DuckDB => {
            #[cfg(feature = "duckdb-backend")]
            {
                let backend = match config.get_duckdb_path(base_dir) {
                    Some(path) => DuckDBBackend::new(&path)?,
                    None => DuckDBBackend::in_memory()?,
                };
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                let _ = base_dir;
                Err(WarehouseError::UnsupportedBackend(
                    "DuckDB backend not enabled. Build with --features duckdb-backend".to_string(),
                ))
            }
        }
        WarehouseBackendType::Redshift => {
            #[cfg(feature = "redshift-backend")]
            {
                let connection_string = config.connection_string()?;
                let backend = RedshiftBackend::connect(&connection_string).await?;
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "redshift-backend"))]
            {
                Err(WarehouseError::UnsupportedBackend(
                    "Redshift backend not enabled. Build with --features redshift-backend"
                        .to_string(),
                ))
            }
        }
    }
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(row: &QueryRow, column: &str, null: &str) -> String {
    match row.get(column).unwrap_or(&serde_json::Value::Null) {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => null.to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = result.columns.join(",");
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| {
                let text = cell_text(row, col, "");
                if text.contains(',') || text.contains('"') || text.contains('\n') {
                    format!("\"{}\"", text.replace('"', "\"\""))
                } else {
                    text
                }
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| cell_text(row, col, "null"))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{:width$}", value, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut lines = Vec::with_capacity(cells.len() + 3);
    lines.push(render(result.columns.as_slice()));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(cells.iter().map(|row| render(row.as_slice())));
    lines.push(format!("({} rows)", result.row_count()));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_first_i64_accepts_text_and_numbers() {
        let numeric = QueryResult::new(
            vec!["row_count".to_string()],
            vec![serde_json::json!({"row_count": 42})],
        );
        assert_eq!(numeric.first_i64("row_count"), Some(42));

        let text = QueryResult::new(
            vec!["row_count".to_string()],
            vec![serde_json::json!({"row_count": "6820"})],
        );
        assert_eq!(text.first_i64("row_count"), Some(6820));
        assert_eq!(text.first_i64("missing"), None);
        assert_eq!(QueryResult::empty().first_i64("row_count"), None);
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["table".to_string(), "rows".to_string()],
            vec![
                serde_json::json!({"table": "songplay", "rows": 333}),
                serde_json::json!({"table": "users", "rows": null}),
            ],
        );

        let output = format_as_table(&result);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "table    | rows");
        assert_eq!(lines[1], "---------+-----");
        assert_eq!(lines[2], "songplay | 333 ");
        assert_eq!(lines[3], "users    | null");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["title".to_string(), "artist".to_string()],
            vec![
                serde_json::json!({"title": "Yellow", "artist": "Coldplay"}),
                serde_json::json!({"title": "Hello, Goodbye", "artist": "The \"Beatles\""}),
            ],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("title,artist\n"));
        assert!(output.contains("Yellow,Coldplay\n"));
        assert!(output.contains("\"Hello, Goodbye\",\"The \"\"Beatles\"\"\""));
    }

    #[test]
    fn test_format_empty_table() {
        assert_eq!(format_as_table(&QueryResult::empty()), "(0 rows)");
    }
}
