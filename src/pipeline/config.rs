//! Pipeline configuration types

use serde::{Deserialize, Serialize};

use crate::database::WarehouseConfig;
use crate::sql::UserLevelPolicy;
use crate::staging::{StagingCopy, copy_table_queries};

use super::error::{PipelineError, PipelineResult};

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Drop every table
    Drop,
    /// Create every table
    Create,
    /// Bulk-load the staging tables
    Load,
    /// Populate the fact and dimension tables from staging
    Transform,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![Self::Drop, Self::Create, Self::Load, Self::Transform]
    }

    /// Stages that reset the schema
    pub fn create_tables() -> Vec<Self> {
        vec![Self::Drop, Self::Create]
    }

    /// Stages that load and transform data into an existing schema
    pub fn etl() -> Vec<Self> {
        vec![Self::Load, Self::Transform]
    }

    /// Get stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::Load => "load",
            Self::Transform => "transform",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Drop => "Drop staging, fact and dimension tables",
            Self::Create => "Create staging, fact and dimension tables",
            Self::Load => "Bulk-load event logs and song metadata into staging",
            Self::Transform => "Insert songplay, users, songs, artists and time rows",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "create" => Ok(Self::Create),
            "load" => Ok(Self::Load),
            "transform" => Ok(Self::Transform),
            _ => Err(format!(
                "Unknown stage: {}. Valid stages: drop, create, load, transform",
                s
            )),
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stages to run (empty = all)
    pub stages: Vec<PipelineStage>,
    /// Users dimension policy for the transform stage
    pub user_level: UserLevelPolicy,
    /// Staging loads for the load stage
    pub copies: Vec<StagingCopy>,
    /// Plan only, do not touch the warehouse
    pub dry_run: bool,
    /// Fingerprint of the warehouse settings, carried into the report
    pub config_fingerprint: Option<String>,
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pipeline for some stages from the warehouse settings
    ///
    /// Staging loads are only resolved when the load stage runs, so schema
    /// resets work without any source configured.
    pub fn from_warehouse(
        config: &WarehouseConfig,
        stages: Vec<PipelineStage>,
    ) -> PipelineResult<Self> {
        let mut pipeline = Self::new()
            .with_stages(stages)
            .with_user_level(config.transform.user_level)
            .with_fingerprint(config.fingerprint());

        if pipeline.should_run_stage(PipelineStage::Load) {
            pipeline = pipeline.with_copies(copy_table_queries(config)?);
        }

        Ok(pipeline)
    }

    /// Set specific stages to run
    pub fn with_stages(mut self, stages: Vec<PipelineStage>) -> Self {
        self.stages = stages;
        self
    }

    /// Set the users dimension policy
    pub fn with_user_level(mut self, policy: UserLevelPolicy) -> Self {
        self.user_level = policy;
        self
    }

    /// Set the staging loads
    pub fn with_copies(mut self, copies: Vec<StagingCopy>) -> Self {
        self.copies = copies;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config_fingerprint = Some(fingerprint.into());
        self
    }

    /// Get stages to run (all if empty), in execution order
    pub fn effective_stages(&self) -> Vec<PipelineStage> {
        if self.stages.is_empty() {
            return PipelineStage::all();
        }

        let mut stages = self.stages.clone();
        stages.sort();
        stages.dedup();
        stages
    }

    /// Check if a specific stage should run
    pub fn should_run_stage(&self, stage: PipelineStage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }

    /// Validate the configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.should_run_stage(PipelineStage::Load) && self.copies.is_empty() {
            return Err(PipelineError::Config(
                "No staging loads configured for the load stage".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::WarehouseBackendType;
    use crate::sql::WarehouseTable;

    #[test]
    fn test_stage_parsing() {
        assert_eq!("Load".parse::<PipelineStage>().unwrap(), PipelineStage::Load);
        assert!("ingest".parse::<PipelineStage>().is_err());
        assert_eq!(PipelineStage::Transform.to_string(), "transform");
    }

    #[test]
    fn test_effective_stages_are_ordered() {
        let config = PipelineConfig::new().with_stages(vec![
            PipelineStage::Transform,
            PipelineStage::Drop,
            PipelineStage::Transform,
        ]);
        assert_eq!(
            config.effective_stages(),
            vec![PipelineStage::Drop, PipelineStage::Transform]
        );
        assert_eq!(PipelineConfig::new().effective_stages(), PipelineStage::all());
    }

    #[test]
    fn test_load_stage_needs_copies() {
        let config = PipelineConfig::new().with_stages(PipelineStage::etl());
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));

        let schema_only = PipelineConfig::new().with_stages(PipelineStage::create_tables());
        assert!(schema_only.validate().is_ok());
    }

    #[test]
    fn test_from_warehouse() {
        let mut warehouse = WarehouseConfig::new();
        warehouse.warehouse.backend = WarehouseBackendType::DuckDB;
        warehouse.transform.user_level = UserLevelPolicy::Latest;

        // Schema stages resolve without sources
        let schema = PipelineConfig::from_warehouse(&warehouse, PipelineStage::create_tables())
            .unwrap();
        assert!(schema.copies.is_empty());
        assert_eq!(schema.user_level, UserLevelPolicy::Latest);
        assert_eq!(schema.config_fingerprint, Some(warehouse.fingerprint()));

        assert!(PipelineConfig::from_warehouse(&warehouse, PipelineStage::etl()).is_err());

        warehouse.sources.log_data = Some("data/log_data".to_string());
        warehouse.sources.log_jsonpath = Some("data/log_json_path.json".to_string());
        warehouse.sources.song_data = Some("data/song_data".to_string());
        let etl = PipelineConfig::from_warehouse(&warehouse, PipelineStage::etl()).unwrap();
        assert_eq!(etl.copies.len(), 2);
        assert_eq!(etl.copies[1].table, WarehouseTable::StagingSongs);
    }
}
