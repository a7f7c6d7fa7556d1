//! Songplay Warehouse - star-schema ETL for music streaming logs
//!
//! Provides:
//! - The warehouse schema and transform statements for Redshift and DuckDB
//! - Staging bulk loads from JSON event and song files
//! - A pipeline executor that resets, loads and populates the warehouse
//! - Warehouse configuration with environment overrides

pub mod database;
pub mod pipeline;
pub mod sql;
pub mod staging;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use database::{
    OutputFormat, QueryResult, TableCount, Warehouse, WarehouseBackendType, WarehouseConfig,
    WarehouseError, WarehouseResult, open_warehouse, table_counts,
};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBBackend;
#[cfg(feature = "redshift-backend")]
pub use database::RedshiftBackend;
pub use pipeline::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineStage, RunReport, run_pipeline,
};
pub use sql::{Dialect, Statement, UserLevelPolicy, WarehouseTable};
pub use staging::{StagingCopy, StagingError};
