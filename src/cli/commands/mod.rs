//! CLI command implementations

use std::path::Path;

use crate::cli::error::CliError;
use crate::database::WarehouseConfig;

pub mod init;
pub mod pipeline;
pub mod query;

/// Load the configuration file with environment overrides applied
pub(crate) fn load_config(path: &Path) -> Result<WarehouseConfig, CliError> {
    Ok(WarehouseConfig::load(path)?)
}

/// Directory relative paths in the configuration resolve against
pub(crate) fn config_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Build the single-use runtime a command runs on
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        assert_eq!(config_dir(Path::new("dwh.toml")), Path::new("."));
        assert_eq!(config_dir(Path::new("/etc/dwh/dwh.toml")), Path::new("/etc/dwh"));
    }
}
