//! Execution driver for the warehouse pipeline
//!
//! This module runs the statement catalog against one warehouse connection:
//! - Drop every table
//! - Create every table
//! - Bulk-load the two staging tables
//! - Populate the fact and dimension tables from staging
//!
//! # Example
//!
//! ```rust,ignore
//! use songplay_warehouse::pipeline::{PipelineConfig, PipelineExecutor, PipelineStage};
//!
//! let config = PipelineConfig::from_warehouse(&warehouse_config, PipelineStage::all())?;
//! let executor = PipelineExecutor::new(config)?;
//! let report = executor.run(warehouse.as_ref()).await?;
//!
//! println!("Pipeline completed in {}", report.duration_formatted());
//! ```
//!
//! # Dry Run
//!
//! Report the statements a run would issue without connecting:
//!
//! ```rust,ignore
//! let executor = PipelineExecutor::new(config.with_dry_run(true))?;
//! let report = executor.dry_run(Dialect::Redshift);
//! ```

mod config;
mod error;
mod executor;

pub use config::{PipelineConfig, PipelineStage};
pub use error::{PipelineError, PipelineResult};
pub use executor::{PipelineExecutor, PlannedStep, RunReport, StepAction, StepReport};

use crate::database::Warehouse;

/// Run a pipeline with the given configuration
pub async fn run_pipeline<W>(config: PipelineConfig, warehouse: &W) -> PipelineResult<RunReport>
where
    W: Warehouse + ?Sized,
{
    let executor = PipelineExecutor::new(config)?;
    executor.run(warehouse).await
}
