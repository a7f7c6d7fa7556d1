//! Pipeline CLI commands
//!
//! `create-tables` resets the schema, `etl` loads staging and populates the
//! star schema, and `run` does both.

use std::path::PathBuf;

use tracing::info;

use super::{config_dir, load_config, runtime};
use crate::cli::error::CliError;
use crate::database::open_warehouse;
use crate::pipeline::{PipelineConfig, PipelineExecutor, PipelineStage, RunReport};

/// Pipeline command arguments
#[derive(Debug, Clone)]
pub struct PipelineArgs {
    /// Configuration file path
    pub config: PathBuf,
    /// Print the planned statements instead of running them
    pub dry_run: bool,
    /// Print the run report as JSON on stdout
    pub json: bool,
}

/// Drop and recreate every table
pub fn handle_create_tables(args: &PipelineArgs) -> Result<(), CliError> {
    run_stages(args, PipelineStage::create_tables())
}

/// Load staging and populate the fact and dimension tables
pub fn handle_etl(args: &PipelineArgs) -> Result<(), CliError> {
    run_stages(args, PipelineStage::etl())
}

/// Reset the schema, then load and transform
pub fn handle_run(args: &PipelineArgs) -> Result<(), CliError> {
    run_stages(args, PipelineStage::all())
}

fn run_stages(args: &PipelineArgs, stages: Vec<PipelineStage>) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    let pipeline = PipelineConfig::from_warehouse(&config, stages)?.with_dry_run(args.dry_run);
    let executor = PipelineExecutor::new(pipeline)?;

    let report = if args.dry_run {
        executor.dry_run(config.dialect())
    } else {
        config.validate_connection()?;

        let base_dir = config_dir(&args.config);
        let rt = runtime()?;

        rt.block_on(async {
            let warehouse = open_warehouse(&config, base_dir).await?;
            info!(backend = warehouse.backend_type(), "Warehouse connected");

            let result = executor.run(warehouse.as_ref()).await;
            warehouse.close().await?;
            result.map_err(CliError::from)
        })?
    };

    print_report(&report, args.json)
}

fn print_report(report: &RunReport, json: bool) -> Result<(), CliError> {
    if json {
        let output = serde_json::to_string_pretty(report)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
        println!("{}", output);
    } else {
        report.print_summary();
    }
    Ok(())
}
