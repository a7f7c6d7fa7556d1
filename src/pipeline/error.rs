//! Error types for pipeline operations
//!
//! A failed step carries the warehouse error as its source, so the CLI can
//! print the full chain while the report names the step that failed.

use thiserror::Error;

use super::config::PipelineStage;
use crate::database::WarehouseError;

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A step failed; the run stops here
    #[error("Stage '{stage}' failed at step '{step}'")]
    StepFailed {
        stage: PipelineStage,
        step: String,
        #[source]
        source: WarehouseError,
    },

    /// Warehouse error outside of a step
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

impl PipelineError {
    /// Name of the failed step, if a step failed
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            PipelineError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
