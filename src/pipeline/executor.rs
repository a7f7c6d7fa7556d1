//! Pipeline executor for running the warehouse stages

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use super::config::{PipelineConfig, PipelineStage};
use super::error::{PipelineError, PipelineResult};
use crate::database::{Warehouse, WarehouseResult};
use crate::sql::{
    Dialect, Statement, WarehouseTable, create_table_queries, drop_table_queries,
    insert_table_queries,
};
use crate::staging::StagingCopy;

/// What a step does against the warehouse
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Run one SQL statement
    Execute(String),
    /// Bulk-load a staging table
    Copy(StagingCopy),
}

/// One step of the plan
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub stage: PipelineStage,
    pub name: String,
    pub table: WarehouseTable,
    pub action: StepAction,
}

impl PlannedStep {
    fn from_statement(stage: PipelineStage, statement: Statement) -> Self {
        Self {
            stage,
            name: statement.label,
            table: statement.table,
            action: StepAction::Execute(statement.sql),
        }
    }

    /// The statement as the backend will see it
    ///
    /// DuckDB performs staging loads without SQL, so loads are described
    /// instead of rendered there.
    pub fn statement_text(&self, dialect: Dialect) -> String {
        match (&self.action, dialect) {
            (StepAction::Execute(sql), _) => sql.clone(),
            (StepAction::Copy(copy), Dialect::Redshift) => copy.to_sql(),
            (StepAction::Copy(copy), Dialect::DuckDB) => copy.describe(),
        }
    }
}

/// Pipeline executor that runs the selected stages in order
pub struct PipelineExecutor {
    config: PipelineConfig,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Every step of the selected stages, in execution order
    pub fn plan(&self, dialect: Dialect) -> Vec<PlannedStep> {
        let mut steps = Vec::new();

        for stage in self.config.effective_stages() {
            match stage {
                PipelineStage::Drop => steps.extend(
                    drop_table_queries(dialect)
                        .into_iter()
                        .map(|s| PlannedStep::from_statement(stage, s)),
                ),
                PipelineStage::Create => steps.extend(
                    create_table_queries(dialect)
                        .into_iter()
                        .map(|s| PlannedStep::from_statement(stage, s)),
                ),
                PipelineStage::Load => {
                    steps.extend(self.config.copies.iter().map(|copy| PlannedStep {
                        stage,
                        name: format!("load {}", copy.table),
                        table: copy.table,
                        action: StepAction::Copy(copy.clone()),
                    }))
                }
                PipelineStage::Transform => steps.extend(
                    insert_table_queries(dialect, self.config.user_level)
                        .into_iter()
                        .map(|s| PlannedStep::from_statement(stage, s)),
                ),
            }
        }

        steps
    }

    /// Report the planned statements without touching the warehouse
    pub fn dry_run(&self, dialect: Dialect) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let steps: Vec<StepReport> = self
            .plan(dialect)
            .into_iter()
            .map(|step| StepReport {
                stage: step.stage,
                statement: step.statement_text(dialect),
                name: step.name,
                table: step.table,
                rows_affected: None,
                duration_ms: 0,
            })
            .collect();

        info!(run_id = %run_id, %dialect, steps = steps.len(), "Dry run planned");

        RunReport {
            run_id,
            started_at: Utc::now(),
            dialect,
            config_fingerprint: self.config.config_fingerprint.clone(),
            dry_run: true,
            steps,
            duration_ms: 0,
        }
    }

    /// Run the pipeline against a warehouse
    ///
    /// Steps run one at a time. The first failure stops the run; nothing is
    /// rolled back or retried.
    pub async fn run<W>(&self, warehouse: &W) -> PipelineResult<RunReport>
    where
        W: Warehouse + ?Sized,
    {
        if self.config.dry_run {
            return Ok(self.dry_run(warehouse.dialect()));
        }

        let run_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            backend = warehouse.backend_type()
        );

        self.execute_plan(warehouse, run_id).instrument(span).await
    }

    async fn execute_plan<W>(&self, warehouse: &W, run_id: String) -> PipelineResult<RunReport>
    where
        W: Warehouse + ?Sized,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let dialect = warehouse.dialect();
        let plan = self.plan(dialect);

        info!(
            run_id = %run_id,
            stages = ?self.config.effective_stages().iter().map(|s| s.name()).collect::<Vec<_>>(),
            steps = plan.len(),
            "Starting pipeline"
        );

        let mut steps = Vec::with_capacity(plan.len());

        for step in plan {
            let step_span = info_span!("pipeline_step", stage = step.stage.name(), step = %step.name);
            let step_start = Instant::now();

            debug!(stage = step.stage.name(), step = %step.name, "Starting step");
            let outcome = Self::run_step(warehouse, &step.action)
                .instrument(step_span)
                .await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(rows) => {
                    info!(
                        stage = step.stage.name(),
                        step = %step.name,
                        rows,
                        duration_ms,
                        "Step completed"
                    );
                    steps.push(StepReport {
                        stage: step.stage,
                        statement: step.statement_text(dialect),
                        name: step.name,
                        table: step.table,
                        rows_affected: Some(rows),
                        duration_ms,
                    });
                }
                Err(e) => {
                    error!(
                        stage = step.stage.name(),
                        step = %step.name,
                        error = %e,
                        "Step failed"
                    );
                    return Err(PipelineError::StepFailed {
                        stage: step.stage,
                        step: step.name,
                        source: e,
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            duration_ms,
            steps = steps.len(),
            "Pipeline completed"
        );

        Ok(RunReport {
            run_id,
            started_at,
            dialect,
            config_fingerprint: self.config.config_fingerprint.clone(),
            dry_run: false,
            steps,
            duration_ms,
        })
    }

    async fn run_step<W>(warehouse: &W, action: &StepAction) -> WarehouseResult<u64>
    where
        W: Warehouse + ?Sized,
    {
        match action {
            StepAction::Execute(sql) => warehouse.execute(sql).await,
            StepAction::Copy(copy) => warehouse.copy_into(copy).await,
        }
    }
}

/// Outcome of one executed (or planned) step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub stage: PipelineStage,
    pub name: String,
    pub table: WarehouseTable,
    /// SQL text, or a description of a local staging load
    pub statement: String,
    /// Rows reported by the warehouse; `None` in a dry run
    pub rows_affected: Option<u64>,
    pub duration_ms: u64,
}

/// Report from a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run ID
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub dialect: Dialect,
    /// Fingerprint of the non-secret warehouse settings
    pub config_fingerprint: Option<String>,
    pub dry_run: bool,
    pub steps: Vec<StepReport>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    /// Find a step by name
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Rows written by the steps of one stage
    pub fn rows_in_stage(&self, stage: PipelineStage) -> u64 {
        self.steps
            .iter()
            .filter(|s| s.stage == stage)
            .filter_map(|s| s.rows_affected)
            .sum()
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        if self.dry_run {
            eprintln!("Pipeline {} - dry run ({})", self.run_id, self.dialect);
            for step in &self.steps {
                eprintln!("  - [{}] {}", step.stage, step.name);
                for line in step.statement.lines() {
                    eprintln!("      {}", line);
                }
            }
            return;
        }

        eprintln!("Pipeline {} - completed ({})", self.run_id, self.dialect);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!("Steps completed: {}", self.steps.len());

        for step in &self.steps {
            let outcome = match (step.stage, step.rows_affected) {
                (PipelineStage::Load | PipelineStage::Transform, Some(rows)) => {
                    format!("{} rows", rows)
                }
                _ => "ok".to_string(),
            };
            eprintln!("  - {}: {} ({}ms)", step.name, outcome, step.duration_ms);
        }
    }
}
