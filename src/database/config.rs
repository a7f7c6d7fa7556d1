//! Warehouse configuration file support
//!
//! Handles parsing of `dwh.toml` configuration files and environment
//! variable overrides. The file groups settings the way the cluster is
//! provisioned: warehouse backend, cluster endpoint, IAM role and the
//! source locations for the staging loads.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::{WarehouseError, WarehouseResult};
use crate::sql::{Dialect, UserLevelPolicy};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "dwh.toml";

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = "sparkify.duckdb";

/// DuckDB path selecting an in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Default Redshift port
pub const DEFAULT_REDSHIFT_PORT: u16 = 5439;

/// Environment variable for the warehouse backend
pub const ENV_BACKEND: &str = "DWH_BACKEND";

/// Environment variable for the DuckDB path
pub const ENV_DUCKDB_PATH: &str = "DWH_DUCKDB_PATH";

/// Environment variables for the cluster endpoint
pub const ENV_HOST: &str = "DWH_HOST";
pub const ENV_DB_NAME: &str = "DWH_DB_NAME";
pub const ENV_DB_USER: &str = "DWH_DB_USER";
pub const ENV_DB_PASSWORD: &str = "DWH_DB_PASSWORD";
pub const ENV_DB_PORT: &str = "DWH_DB_PORT";

/// Environment variable for the IAM role ARN
pub const ENV_IAM_ROLE_ARN: &str = "DWH_IAM_ROLE_ARN";

/// Environment variables for the source locations
pub const ENV_LOG_DATA: &str = "DWH_LOG_DATA";
pub const ENV_LOG_JSONPATH: &str = "DWH_LOG_JSONPATH";
pub const ENV_SONG_DATA: &str = "DWH_SONG_DATA";

static RE_PASSWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"password=(?:'(?:[^'\\]|\\.)*'|\S+)").expect("Invalid regex")
});

/// Warehouse backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackendType {
    /// Amazon Redshift (default)
    #[default]
    Redshift,
    /// DuckDB embedded database
    DuckDB,
}

impl WarehouseBackendType {
    /// SQL dialect of the backend
    pub fn dialect(&self) -> Dialect {
        match self {
            WarehouseBackendType::Redshift => Dialect::Redshift,
            WarehouseBackendType::DuckDB => Dialect::DuckDB,
        }
    }
}

impl std::str::FromStr for WarehouseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redshift" => Ok(WarehouseBackendType::Redshift),
            "duckdb" => Ok(WarehouseBackendType::DuckDB),
            _ => Err(format!(
                "Unknown warehouse backend: {}. Use 'redshift' or 'duckdb'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for WarehouseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarehouseBackendType::Redshift => write!(f, "redshift"),
            WarehouseBackendType::DuckDB => write!(f, "duckdb"),
        }
    }
}

/// Warehouse selection section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSection {
    /// Warehouse backend type
    #[serde(default)]
    pub backend: WarehouseBackendType,

    /// Path to the DuckDB database file, or `:memory:`
    #[serde(default = "default_duckdb_path")]
    pub duckdb_path: String,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            backend: WarehouseBackendType::default(),
            duckdb_path: default_duckdb_path(),
        }
    }
}

/// Redshift cluster endpoint and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_password: Option<String>,

    #[serde(default = "default_port")]
    pub db_port: u16,
}

fn default_port() -> u16 {
    DEFAULT_REDSHIFT_PORT
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            host: None,
            db_name: None,
            db_user: None,
            db_password: None,
            db_port: default_port(),
        }
    }
}

/// IAM role the cluster assumes to read the sources
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IamRoleSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Source locations for the staging loads
///
/// S3 URIs for Redshift; local paths or path prefixes for DuckDB.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourcesSection {
    /// Event log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_data: Option<String>,

    /// JSONPaths file mapping event fields to `staging_events` columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_jsonpath: Option<String>,

    /// Song metadata files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_data: Option<String>,

    /// Bucket region, when it differs from the cluster's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Transform options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransformSection {
    /// Handling of users whose level changes across events
    #[serde(default)]
    pub user_level: UserLevelPolicy,
}

/// Main configuration structure
///
/// Represents the `dwh.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(default)]
    pub cluster: ClusterSection,

    #[serde(default)]
    pub iam_role: IamRoleSection,

    #[serde(default, alias = "s3")]
    pub sources: SourcesSection,

    #[serde(default)]
    pub transform: TransformSection,
}

impl WarehouseConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a DuckDB configuration reading local sources
    pub fn duckdb(
        path: impl Into<String>,
        log_data: impl Into<String>,
        log_jsonpath: impl Into<String>,
        song_data: impl Into<String>,
    ) -> Self {
        Self {
            warehouse: WarehouseSection {
                backend: WarehouseBackendType::DuckDB,
                duckdb_path: path.into(),
            },
            sources: SourcesSection {
                log_data: Some(log_data.into()),
                log_jsonpath: Some(log_jsonpath.into()),
                song_data: Some(song_data.into()),
                region: None,
            },
            ..Default::default()
        }
    }

    /// Load configuration from a file
    ///
    /// Falls back to defaults if the file does not exist, so a run can be
    /// configured entirely through environment variables.
    pub fn load(config_path: &Path) -> WarehouseResult<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| WarehouseError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> WarehouseResult<Self> {
        toml::from_str(content)
            .map_err(|e| WarehouseError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a file
    pub fn save(&self, config_path: &Path) -> WarehouseResult<()> {
        let content = self.to_toml()?;

        std::fs::write(config_path, content)
            .map_err(|e| WarehouseError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> WarehouseResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            WarehouseError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> WarehouseResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    ///
    /// A value that does not parse fails instead of falling back to the file.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> WarehouseResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.warehouse.backend = backend
                .parse()
                .map_err(|e: String| invalid_override(ENV_BACKEND, &backend, &e))?;
        }

        if let Some(path) = lookup(ENV_DUCKDB_PATH) {
            self.warehouse.duckdb_path = path;
        }

        // Plain string settings
        for (key, slot) in [
            (ENV_HOST, &mut self.cluster.host),
            (ENV_DB_NAME, &mut self.cluster.db_name),
            (ENV_DB_USER, &mut self.cluster.db_user),
            (ENV_DB_PASSWORD, &mut self.cluster.db_password),
            (ENV_IAM_ROLE_ARN, &mut self.iam_role.arn),
            (ENV_LOG_DATA, &mut self.sources.log_data),
            (ENV_LOG_JSONPATH, &mut self.sources.log_jsonpath),
            (ENV_SONG_DATA, &mut self.sources.song_data),
        ] {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }

        if let Some(port) = lookup(ENV_DB_PORT) {
            self.cluster.db_port = port
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    invalid_override(ENV_DB_PORT, &port, &e.to_string())
                })?;
        }

        Ok(())
    }

    /// SQL dialect of the configured backend
    pub fn dialect(&self) -> Dialect {
        self.warehouse.backend.dialect()
    }

    /// Settings required to connect that are not set
    pub fn missing_connection_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.warehouse.backend == WarehouseBackendType::Redshift {
            let cluster = &self.cluster;
            for (name, value) in [
                ("cluster.host", &cluster.host),
                ("cluster.db_name", &cluster.db_name),
                ("cluster.db_user", &cluster.db_user),
                ("cluster.db_password", &cluster.db_password),
            ] {
                if is_blank(value) {
                    missing.push(name);
                }
            }
        }

        missing
    }

    /// Settings required by the staging loads that are not set
    pub fn missing_source_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();

        if self.warehouse.backend == WarehouseBackendType::Redshift && is_blank(&self.iam_role.arn)
        {
            missing.push("iam_role.arn");
        }

        for (name, value) in [
            ("sources.log_data", &self.sources.log_data),
            ("sources.log_jsonpath", &self.sources.log_jsonpath),
            ("sources.song_data", &self.sources.song_data),
        ] {
            if is_blank(value) {
                missing.push(name);
            }
        }

        missing
    }

    /// Check that the warehouse can be reached
    pub fn validate_connection(&self) -> WarehouseResult<()> {
        missing_settings_error(self.missing_connection_settings())
    }

    /// Check that the staging loads are fully described
    pub fn validate_sources(&self) -> WarehouseResult<()> {
        missing_settings_error(self.missing_source_settings())
    }

    /// Check everything a full run needs
    pub fn validate(&self) -> WarehouseResult<()> {
        let mut missing = self.missing_connection_settings();
        missing.extend(self.missing_source_settings());
        missing_settings_error(missing)
    }

    /// Get the full path to the DuckDB database file
    ///
    /// Relative paths are resolved against `base_dir`. Returns `None` for an
    /// in-memory database.
    pub fn get_duckdb_path(&self, base_dir: &Path) -> Option<PathBuf> {
        let path = self.warehouse.duckdb_path.as_str();
        if path == IN_MEMORY_PATH {
            return None;
        }

        let path = PathBuf::from(path);
        if path.is_absolute() {
            Some(path)
        } else {
            Some(base_dir.join(path))
        }
    }

    /// Connection string for the Redshift cluster, in libpq key/value form
    pub fn connection_string(&self) -> WarehouseResult<String> {
        self.validate_connection()?;

        let cluster = &self.cluster;
        let mut parts = Vec::with_capacity(5);
        for (key, value) in [
            ("host", &cluster.host),
            ("dbname", &cluster.db_name),
            ("user", &cluster.db_user),
            ("password", &cluster.db_password),
        ] {
            if let Some(value) = value {
                parts.push(format!("{}={}", key, quote_conninfo(value)));
            }
        }
        parts.push(format!("port={}", cluster.db_port));

        Ok(parts.join(" "))
    }

    /// Stable hash of every setting except secrets
    ///
    /// Two runs with the same fingerprint loaded the same sources into the
    /// same warehouse with the same transform options.
    pub fn fingerprint(&self) -> String {
        let settings = [
            self.warehouse.backend.to_string(),
            self.warehouse.duckdb_path.clone(),
            self.cluster.host.clone().unwrap_or_default(),
            self.cluster.db_name.clone().unwrap_or_default(),
            self.cluster.db_user.clone().unwrap_or_default(),
            self.cluster.db_port.to_string(),
            self.iam_role.arn.clone().unwrap_or_default(),
            self.sources.log_data.clone().unwrap_or_default(),
            self.sources.log_jsonpath.clone().unwrap_or_default(),
            self.sources.song_data.clone().unwrap_or_default(),
            self.sources.region.clone().unwrap_or_default(),
            self.transform.user_level.to_string(),
        ];

        let mut hasher = Sha256::new();
        for setting in &settings {
            hasher.update(setting.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

fn invalid_override(key: &str, value: &str, reason: &str) -> WarehouseError {
    WarehouseError::ConfigError(format!("Invalid {}={:?}: {}", key, value, reason))
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn missing_settings_error(missing: Vec<&'static str>) -> WarehouseResult<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WarehouseError::ConfigError(format!(
            "Missing required settings: {}",
            missing.join(", ")
        )))
    }
}

/// Quote a libpq connection value when it needs it
fn quote_conninfo(value: &str) -> String {
    if !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\')
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Replace the password in a connection string with asterisks
pub fn mask_password(connection_string: &str) -> String {
    RE_PASSWORD
        .replace_all(connection_string, "password=****")
        .into_owned()
}

/// Generate a sample configuration file
pub fn sample_config(backend: WarehouseBackendType) -> String {
    match backend {
        WarehouseBackendType::Redshift => r#"# Warehouse configuration

[warehouse]
backend = "redshift"

[cluster]
host = "dwhcluster.abc123xyz789.us-west-2.redshift.amazonaws.com"
db_name = "dwh"
db_user = "dwhuser"
db_password = "change-me"
db_port = 5439

[iam_role]
arn = "arn:aws:iam::123456789012:role/dwhRole"

[sources]
log_data = "s3://udacity-dend/log_data"
log_jsonpath = "s3://udacity-dend/log_json_path.json"
song_data = "s3://udacity-dend/song_data"
region = "us-west-2"

[transform]
# "distinct" keeps one users row per attribute combination (a level change
# fails the insert); "latest" keeps the level of each user's latest event
user_level = "distinct"
"#
        .to_string(),
        WarehouseBackendType::DuckDB => r#"# Warehouse configuration

[warehouse]
backend = "duckdb"
duckdb_path = "sparkify.duckdb"

[sources]
log_data = "data/log_data"
log_jsonpath = "data/log_json_path.json"
song_data = "data/song_data"

[transform]
# "distinct" keeps one users row per attribute combination (a level change
# fails the insert); "latest" keeps the level of each user's latest event
user_level = "distinct"
"#
        .to_string(),
    }
}
