//! Configuration file scaffolding

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::database::config::{WarehouseBackendType, sample_config};

/// Init-config command arguments
#[derive(Debug, Clone)]
pub struct InitConfigArgs {
    /// Where to write the configuration file
    pub output: PathBuf,
    /// Backend the sample targets
    pub backend: WarehouseBackendType,
    /// Overwrite an existing file
    pub force: bool,
}

/// Write a sample configuration file
pub fn handle_init_config(args: &InitConfigArgs) -> Result<(), CliError> {
    if args.output.exists() && !args.force {
        return Err(CliError::FileExists(args.output.clone()));
    }

    std::fs::write(&args.output, sample_config(args.backend)).map_err(|e| {
        CliError::IoError(format!(
            "Failed to write {}: {}",
            args.output.display(),
            e
        ))
    })?;

    eprintln!(
        "Wrote {} configuration to {}",
        args.backend,
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::WarehouseConfig;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_sample() {
        let dir = TempDir::new().unwrap();
        let args = InitConfigArgs {
            output: dir.path().join("dwh.toml"),
            backend: WarehouseBackendType::DuckDB,
            force: false,
        };

        handle_init_config(&args).unwrap();
        let written = std::fs::read_to_string(&args.output).unwrap();
        let config = WarehouseConfig::parse(&written).unwrap();
        assert_eq!(config.warehouse.backend, WarehouseBackendType::DuckDB);

        // A second write needs --force
        assert!(matches!(
            handle_init_config(&args),
            Err(CliError::FileExists(_))
        ));
        let forced = InitConfigArgs {
            force: true,
            backend: WarehouseBackendType::Redshift,
            ..args
        };
        handle_init_config(&forced).unwrap();
        assert!(
            std::fs::read_to_string(&forced.output)
                .unwrap()
                .contains("backend = \"redshift\"")
        );
    }
}
