//! CLI-specific error types

use std::path::PathBuf;
use thiserror::Error;

use crate::database::WarehouseError;
use crate::pipeline::PipelineError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error(transparent)]
    DatabaseError(#[from] WarehouseError),

    #[error(transparent)]
    PipelineError(#[from] PipelineError),

    #[error("File already exists: {0}. Use --force to overwrite.")]
    FileExists(PathBuf),
}

impl CliError {
    /// The error followed by each distinct cause, one per line
    pub fn report(&self) -> String {
        let mut lines = vec![format!("Error: {}", self)];
        let mut previous = self.to_string();
        let mut source = std::error::Error::source(self);

        while let Some(cause) = source {
            let text = cause.to_string();
            if !previous.contains(&text) {
                lines.push(format!("  Caused by: {}", text));
            }
            previous = text;
            source = cause.source();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineStage;

    #[test]
    fn test_report_includes_step_cause() {
        let err = CliError::from(PipelineError::StepFailed {
            stage: PipelineStage::Transform,
            step: "insert users".to_string(),
            source: WarehouseError::QueryFailed("duplicate key".to_string()),
        });

        assert_eq!(
            err.report(),
            "Error: Stage 'transform' failed at step 'insert users'\n  \
             Caused by: Query failed: duplicate key"
        );
    }

    #[test]
    fn test_report_skips_repeated_causes() {
        let err = CliError::from(WarehouseError::ConfigError(
            "Missing required settings: cluster.host".to_string(),
        ));
        assert_eq!(
            err.report(),
            "Error: Configuration error: Missing required settings: cluster.host"
        );
    }
}
