//! Error types for staging sources

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving or reading staging sources
#[derive(Error, Debug)]
pub enum StagingError {
    /// No files matched the source location
    #[error("No source files found at {0}")]
    NoSourceFiles(String),

    /// Source not accessible
    #[error("Source not accessible: {path} - {reason}")]
    SourceNotAccessible { path: String, reason: String },

    /// Source location cannot be read by this backend
    #[error("Unsupported source location: {0}")]
    UnsupportedLocation(String),

    /// JSON parsing error for a specific file
    #[error("JSON parsing error in {path} at record {record}: {error}")]
    JsonParse {
        path: PathBuf,
        record: usize,
        error: String,
    },

    /// A record that is not a JSON object
    #[error("Invalid record in {path} at record {record}: expected a JSON object")]
    NotAnObject { path: PathBuf, record: usize },

    /// Malformed JSONPaths file or expression
    #[error("Invalid JSONPaths: {0}")]
    JsonPaths(String),

    /// Pattern matching error
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StagingError::NoSourceFiles(location) => format!(
                "No source files found at '{}'.\n\nCheck the [sources] section of the configuration.",
                location
            ),
            StagingError::UnsupportedLocation(location) => format!(
                "Cannot read '{}' with the DuckDB backend.\n\nUse local paths, or set backend = \"redshift\" to load from S3.",
                location
            ),
            StagingError::JsonPaths(msg) => format!(
                "Invalid JSONPaths file: {}\n\nExpected {{\"jsonpaths\": [\"$['field']\", ...]}} with one path per staging column.",
                msg
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hints() {
        let err = StagingError::UnsupportedLocation("s3://bucket/log_data".to_string());
        assert!(err.user_message().contains("backend = \"redshift\""));

        let err = StagingError::NotAnObject {
            path: PathBuf::from("events.json"),
            record: 3,
        };
        assert_eq!(err.user_message(), err.to_string());
        assert!(err.to_string().contains("record 3"));
    }
}
