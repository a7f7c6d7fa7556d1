//! DuckDB warehouse backend implementation
//!
//! Provides an embedded warehouse for local runs and tests. Runs the same
//! statement catalog as Redshift in the DuckDB dialect and performs staging
//! loads itself from local JSON files.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{QueryResult, Warehouse, WarehouseError, WarehouseResult};
use crate::sql::{ColumnDef, Dialect, WarehouseTable};
use crate::staging::StagingCopy;
use crate::staging::source::{ColumnMapping, discover_files, read_json_records};

/// DuckDB warehouse backend
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> WarehouseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        debug!(path = %path.display(), "Opened DuckDB warehouse");

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    pub fn in_memory() -> WarehouseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> WarehouseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| WarehouseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Load every record behind a staging source in one transaction
    fn load_staging(&self, copy: &StagingCopy) -> WarehouseResult<u64> {
        let table = copy.table;
        let load_failed = |message: String| WarehouseError::LoadFailed {
            table: table.to_string(),
            message,
        };

        let columns = table
            .staging_columns()
            .ok_or_else(|| load_failed("not a staging table".to_string()))?;

        if copy.iam_role_arn.is_some() || copy.region.is_some() {
            debug!(%table, "Ignoring IAM role and region for local sources");
        }

        let mapping = ColumnMapping::for_format(&copy.format, columns)?;
        let files = discover_files(&copy.source)?;
        let sql = staging_insert_sql(table, columns);

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| load_failed(format!("Failed to begin transaction: {}", e)))?;

        let mut loaded = 0u64;
        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| load_failed(format!("Prepare failed: {}", e)))?;

            for file in &files {
                let records = read_json_records(file)?;
                for (index, record) in records.iter().enumerate() {
                    let values = mapping.row_values(record, columns);
                    stmt.execute(duckdb::params_from_iter(values.iter()))
                        .map_err(|e| {
                            load_failed(format!(
                                "{} record {}: {}",
                                file.display(),
                                index + 1,
                                e
                            ))
                        })?;
                }
                loaded += records.len() as u64;
                debug!(%table, file = %file.display(), records = records.len(), "Loaded file");
            }
        }

        tx.commit()
            .map_err(|e| load_failed(format!("Commit failed: {}", e)))?;

        info!(%table, files = files.len(), rows = loaded, "Staging load complete");
        Ok(loaded)
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value: serde_json::Value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Timestamp(unit, ticks) => timestamp_text(unit, ticks)
                .map(serde_json::Value::String)
                .unwrap_or_else(|| serde_json::Value::String(format!("{:?}", value))),
            ValueRef::Date32(days) => chrono::DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                .map(|d| serde_json::Value::String(d.date_naive().to_string()))
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Time64(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Interval { .. } => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::List(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Enum(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Struct(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Map(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Union(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Array(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Decimal(d) => serde_json::Value::String(d.to_string()),
            // ValueRef is #[non_exhaustive]
            _ => serde_json::Value::String(format!("{:?}", value)),
        }
    }
}

/// Render a DuckDB timestamp the way Redshift prints one
fn timestamp_text(unit: duckdb::types::TimeUnit, ticks: i64) -> Option<String> {
    use duckdb::types::TimeUnit;

    let micros = match unit {
        TimeUnit::Second => ticks.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => ticks.checked_mul(1_000)?,
        TimeUnit::Microsecond => ticks,
        TimeUnit::Nanosecond => ticks / 1_000,
    };

    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

/// Row insert for a staging table, casting text values to column types
fn staging_insert_sql(table: WarehouseTable, columns: &[ColumnDef]) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
    let values: Vec<String> = columns
        .iter()
        .map(|c| format!("CAST(? AS {})", c.sql_type))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        values.join(", ")
    )
}

#[async_trait(?Send)]
impl Warehouse for DuckDBBackend {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDB
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn execute(&self, sql: &str) -> WarehouseResult<u64> {
        let conn = self.lock()?;

        let affected = conn
            .execute(sql, [])
            .map_err(|e| WarehouseError::QueryFailed(format!("Execute failed: {}", e)))?;

        Ok(affected as u64)
    }

    async fn execute_query(&self, sql: &str) -> WarehouseResult<QueryResult> {
        let start = std::time::Instant::now();

        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WarehouseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // Column names are only known once the statement has run
        let mut result_rows = stmt
            .query([])
            .map_err(|e| WarehouseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| WarehouseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn copy_into(&self, copy: &StagingCopy) -> WarehouseResult<u64> {
        self.load_staging(copy)
    }

    async fn health_check(&self) -> WarehouseResult<bool> {
        let result = self.execute_query("SELECT 1 as healthy").await?;
        Ok(!result.rows.is_empty())
    }

    async fn close(&self) -> WarehouseResult<()> {
        // The connection closes when the backend is dropped
        Ok(())
    }
}
