//! Statement catalog for the star schema
//!
//! Every statement the pipeline issues is defined here as plain SQL text:
//! - [`schema`]: drop and create statements for the seven tables
//! - [`transform`]: the five INSERT/SELECT statements that populate the
//!   fact and dimension tables from staging
//!
//! Staging loads are described separately in [`crate::staging`] because the
//! DuckDB backend performs them without SQL `COPY`.

use serde::{Deserialize, Serialize};

pub mod schema;
pub mod transform;

pub use schema::{ColumnDef, create_table_queries, drop_table_queries};
pub use transform::{UserLevelPolicy, insert_table_queries};

/// SQL flavour spoken by a warehouse backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Amazon Redshift
    Redshift,
    /// DuckDB
    DuckDB,
}

impl Dialect {
    /// Expression converting a column of epoch milliseconds into a timestamp
    ///
    /// Both renderings compute `epoch + ts/1000 seconds` and keep the
    /// millisecond fraction.
    pub fn epoch_millis_to_timestamp(&self, column: &str) -> String {
        match self {
            Dialect::Redshift => format!(
                "TIMESTAMP 'epoch' + CAST({} AS BIGINT) / 1000.0 * INTERVAL '1 second'",
                column
            ),
            Dialect::DuckDB => format!("epoch_ms(CAST({} AS BIGINT))", column),
        }
    }

    /// Date part name for the day of week, numbered 0 (Sunday) to 6 (Saturday)
    pub fn weekday_part(&self) -> &'static str {
        match self {
            Dialect::Redshift => "weekday",
            Dialect::DuckDB => "dow",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Redshift => write!(f, "redshift"),
            Dialect::DuckDB => write!(f, "duckdb"),
        }
    }
}

/// Role of a table in the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Staging,
    Fact,
    Dimension,
}

/// The seven tables managed by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    StagingEvents,
    StagingSongs,
    Songplay,
    Users,
    Songs,
    Artists,
    Time,
}

impl WarehouseTable {
    /// All tables in drop/create order
    pub const ALL: [WarehouseTable; 7] = [
        WarehouseTable::StagingEvents,
        WarehouseTable::StagingSongs,
        WarehouseTable::Songplay,
        WarehouseTable::Users,
        WarehouseTable::Songs,
        WarehouseTable::Artists,
        WarehouseTable::Time,
    ];

    /// Table name as it appears in SQL
    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::StagingEvents => "staging_events",
            WarehouseTable::StagingSongs => "staging_songs",
            WarehouseTable::Songplay => "songplay",
            WarehouseTable::Users => "users",
            WarehouseTable::Songs => "songs",
            WarehouseTable::Artists => "artists",
            WarehouseTable::Time => "time",
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            WarehouseTable::StagingEvents | WarehouseTable::StagingSongs => TableKind::Staging,
            WarehouseTable::Songplay => TableKind::Fact,
            _ => TableKind::Dimension,
        }
    }

    /// Column layout of a staging table, in load order
    ///
    /// Returns `None` for warehouse tables, which are only written by SQL.
    pub fn staging_columns(&self) -> Option<&'static [ColumnDef]> {
        match self {
            WarehouseTable::StagingEvents => Some(schema::STAGING_EVENTS_COLUMNS),
            WarehouseTable::StagingSongs => Some(schema::STAGING_SONGS_COLUMNS),
            _ => None,
        }
    }
}

impl std::fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WarehouseTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WarehouseTable::ALL
            .into_iter()
            .find(|table| table.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown table: {}", s))
    }
}

/// A single SQL statement in the pipeline plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Short label used in logs and run reports (e.g. "create songplay")
    pub label: String,
    /// Table the statement acts on
    pub table: WarehouseTable,
    /// SQL text
    pub sql: String,
}

impl Statement {
    pub fn new(label: impl Into<String>, table: WarehouseTable, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            table,
            sql: sql.into(),
        }
    }
}
