//! Staging bulk loads
//!
//! A [`StagingCopy`] describes how one staging table is filled from JSON
//! sources. The Redshift backend renders it as a native `COPY` statement.
//! The DuckDB backend reads the sources itself (see [`source`]) with the
//! same column mapping and all-or-nothing behavior.

use serde::{Deserialize, Serialize};

pub mod error;
pub mod jsonpaths;
#[cfg(feature = "duckdb-backend")]
pub mod source;

pub use error::StagingError;
pub use jsonpaths::{JsonPath, JsonPaths};

use crate::database::config::WarehouseConfig;
use crate::database::{WarehouseError, WarehouseResult};
use crate::sql::WarehouseTable;

/// How JSON fields map onto staging columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonFormat {
    /// Top-level keys matched to column names
    Auto,
    /// Positional mapping through a JSONPaths file at this location
    JsonPaths(String),
}

/// A bulk load of JSON sources into one staging table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingCopy {
    /// Target staging table
    pub table: WarehouseTable,
    /// Source location (S3 prefix for Redshift, local path or prefix for DuckDB)
    pub source: String,
    /// IAM role ARN authorizing the load
    pub iam_role_arn: Option<String>,
    /// Region of the source bucket, when it differs from the cluster's
    pub region: Option<String>,
    /// Parse timestamp fields in automatic format
    pub time_format_auto: bool,
    /// JSON to column mapping
    pub format: JsonFormat,
}

impl StagingCopy {
    /// Render the Redshift `COPY` statement for this load
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "COPY {}\nFROM {}",
            self.table.name(),
            quote_literal(&self.source)
        );

        if let Some(arn) = &self.iam_role_arn {
            sql.push_str(&format!(
                "\nCREDENTIALS {}",
                quote_literal(&format!("aws_iam_role={}", arn))
            ));
        }
        if let Some(region) = &self.region {
            sql.push_str(&format!("\nREGION {}", quote_literal(region)));
        }
        if self.time_format_auto {
            sql.push_str("\nTIMEFORMAT AS 'auto'");
        }

        let mapping = match &self.format {
            JsonFormat::Auto => quote_literal("auto"),
            JsonFormat::JsonPaths(location) => quote_literal(location),
        };
        sql.push_str(&format!("\nFORMAT AS JSON {}", mapping));

        sql
    }

    /// One-line description for logs and dry runs
    pub fn describe(&self) -> String {
        let mapping = match &self.format {
            JsonFormat::Auto => "auto".to_string(),
            JsonFormat::JsonPaths(location) => format!("jsonpaths {}", location),
        };
        format!(
            "load JSON from {} into {} ({})",
            self.source, self.table, mapping
        )
    }
}

/// Quote a value as a SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// The two staging loads, events first
///
/// Fails with a configuration error naming every missing source setting.
pub fn copy_table_queries(config: &WarehouseConfig) -> WarehouseResult<Vec<StagingCopy>> {
    config.validate_sources()?;

    let sources = &config.sources;
    let (Some(log_data), Some(log_jsonpath), Some(song_data)) = (
        sources.log_data.as_ref(),
        sources.log_jsonpath.as_ref(),
        sources.song_data.as_ref(),
    ) else {
        return Err(WarehouseError::ConfigError(
            "source locations are not configured".to_string(),
        ));
    };

    Ok(vec![
        StagingCopy {
            table: WarehouseTable::StagingEvents,
            source: log_data.clone(),
            iam_role_arn: config.iam_role.arn.clone(),
            region: sources.region.clone(),
            time_format_auto: true,
            format: JsonFormat::JsonPaths(log_jsonpath.clone()),
        },
        StagingCopy {
            table: WarehouseTable::StagingSongs,
            source: song_data.clone(),
            iam_role_arn: config.iam_role.arn.clone(),
            region: sources.region.clone(),
            time_format_auto: false,
            format: JsonFormat::Auto,
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::config::WarehouseBackendType;

    fn events_copy() -> StagingCopy {
        StagingCopy {
            table: WarehouseTable::StagingEvents,
            source: "s3://udacity-dend/log_data".to_string(),
            iam_role_arn: Some("arn:aws:iam::123456789012:role/dwhRole".to_string()),
            region: None,
            time_format_auto: true,
            format: JsonFormat::JsonPaths("s3://udacity-dend/log_json_path.json".to_string()),
        }
    }

    #[test]
    fn test_events_copy_sql() {
        assert_eq!(
            events_copy().to_sql(),
            "COPY staging_events\n\
             FROM 's3://udacity-dend/log_data'\n\
             CREDENTIALS 'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole'\n\
             TIMEFORMAT AS 'auto'\n\
             FORMAT AS JSON 's3://udacity-dend/log_json_path.json'"
        );
    }

    #[test]
    fn test_songs_copy_sql_with_region() {
        let copy = StagingCopy {
            table: WarehouseTable::StagingSongs,
            source: "s3://udacity-dend/song_data".to_string(),
            region: Some("us-west-2".to_string()),
            time_format_auto: false,
            format: JsonFormat::Auto,
            ..events_copy()
        };
        let sql = copy.to_sql();
        assert!(sql.starts_with("COPY staging_songs\nFROM 's3://udacity-dend/song_data'"));
        assert!(sql.contains("\nREGION 'us-west-2'"));
        assert!(!sql.contains("TIMEFORMAT"));
        assert!(sql.ends_with("FORMAT AS JSON 'auto'"));
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        let copy = StagingCopy {
            source: "s3://bucket/o'brien".to_string(),
            ..events_copy()
        };
        assert!(copy.to_sql().contains("FROM 's3://bucket/o''brien'"));
    }

    #[test]
    fn test_copy_table_queries_use_song_data_for_songs() {
        let mut config = WarehouseConfig::new();
        config.warehouse.backend = WarehouseBackendType::DuckDB;
        config.sources.log_data = Some("data/log_data".to_string());
        config.sources.log_jsonpath = Some("data/log_json_path.json".to_string());
        config.sources.song_data = Some("data/song_data".to_string());

        let copies = copy_table_queries(&config).unwrap();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].table, WarehouseTable::StagingEvents);
        assert_eq!(
            copies[0].format,
            JsonFormat::JsonPaths("data/log_json_path.json".to_string())
        );
        assert!(copies[0].time_format_auto);
        assert_eq!(copies[1].table, WarehouseTable::StagingSongs);
        assert_eq!(copies[1].source, "data/song_data");
        assert_eq!(copies[1].format, JsonFormat::Auto);
    }

    #[test]
    fn test_copy_table_queries_report_missing_sources() {
        let mut config = WarehouseConfig::new();
        config.warehouse.backend = WarehouseBackendType::DuckDB;
        config.sources.log_data = Some("data/log_data".to_string());

        let err = copy_table_queries(&config).unwrap_err().to_string();
        assert!(err.contains("sources.log_jsonpath"));
        assert!(err.contains("sources.song_data"));
    }
}
