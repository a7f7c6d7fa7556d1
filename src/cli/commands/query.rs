//! SQL query CLI commands
//!
//! Runs ad-hoc or preset analytical queries against the warehouse, and
//! reports the row count of every table.

use std::path::PathBuf;

use super::{config_dir, load_config, runtime};
use crate::cli::error::CliError;
use crate::database::{
    OutputFormat, QueryResult, TableCount, format_query_result, open_warehouse, table_counts,
};

/// Preset analytical queries over the star schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPreset {
    TopSongs,
    TopArtists,
    PlaysByHour,
    PlaysByWeekday,
    LevelSplit,
}

impl QueryPreset {
    pub fn sql(&self) -> &'static str {
        match self {
            QueryPreset::TopSongs => queries::TOP_SONGS,
            QueryPreset::TopArtists => queries::TOP_ARTISTS,
            QueryPreset::PlaysByHour => queries::PLAYS_BY_HOUR,
            QueryPreset::PlaysByWeekday => queries::PLAYS_BY_WEEKDAY,
            QueryPreset::LevelSplit => queries::LEVEL_SPLIT,
        }
    }
}

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Configuration file path
    pub config: PathBuf,
    /// SQL query to execute
    pub sql: Option<String>,
    /// Preset query to execute instead
    pub preset: Option<QueryPreset>,
    /// Output format
    pub format: String,
}

/// Counts command arguments
#[derive(Debug, Clone)]
pub struct CountsArgs {
    /// Configuration file path
    pub config: PathBuf,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the warehouse
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let sql = match (&args.sql, args.preset) {
        (Some(sql), None) => sql.clone(),
        (None, Some(preset)) => preset.sql().trim().to_string(),
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidArgument(
                "Provide either a SQL query or --preset, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(CliError::InvalidArgument(
                "Provide a SQL query or --preset".to_string(),
            ));
        }
    };

    let output_format = parse_format(&args.format)?;
    let config = load_config(&args.config)?;
    config.validate_connection()?;

    let rt = runtime()?;
    let result = rt.block_on(async {
        let warehouse = open_warehouse(&config, config_dir(&args.config)).await?;
        let result = warehouse.execute_query(&sql).await;
        warehouse.close().await?;
        result.map_err(CliError::from)
    })?;

    println!("{}", format_query_result(&result, output_format));

    // Print execution time for non-JSON formats
    if output_format != OutputFormat::Json {
        eprintln!("\nExecution time: {}ms", result.execution_time_ms);
    }

    Ok(())
}

/// Print the row count of every table
pub fn handle_counts(args: &CountsArgs) -> Result<(), CliError> {
    let output_format = parse_format(&args.format)?;
    let config = load_config(&args.config)?;
    config.validate_connection()?;

    let rt = runtime()?;
    let counts = rt.block_on(async {
        let warehouse = open_warehouse(&config, config_dir(&args.config)).await?;
        let counts = table_counts(warehouse.as_ref()).await;
        warehouse.close().await?;
        counts.map_err(CliError::from)
    })?;

    println!("{}", format_query_result(&counts_result(&counts), output_format));
    Ok(())
}

fn parse_format(format: &str) -> Result<OutputFormat, CliError> {
    format
        .parse::<OutputFormat>()
        .map_err(CliError::InvalidArgument)
}

fn counts_result(counts: &[TableCount]) -> QueryResult {
    QueryResult::new(
        vec!["table".to_string(), "rows".to_string()],
        counts
            .iter()
            .map(|count| serde_json::json!({"table": count.table.name(), "rows": count.rows}))
            .collect(),
    )
}

/// Common analytical queries
pub mod queries {
    /// Most played songs
    pub const TOP_SONGS: &str = r#"
SELECT s.title, a.name AS artist, COUNT(*) AS plays
FROM songplay sp
JOIN songs s ON sp.song_id = s.song_id
JOIN artists a ON sp.artist_id = a.artist_id
GROUP BY s.title, a.name
ORDER BY plays DESC, s.title
LIMIT 10
"#;

    /// Most played artists
    pub const TOP_ARTISTS: &str = r#"
SELECT a.name AS artist, COUNT(*) AS plays, COUNT(DISTINCT sp.user_id) AS listeners
FROM songplay sp
JOIN artists a ON sp.artist_id = a.artist_id
GROUP BY a.name
ORDER BY plays DESC, a.name
LIMIT 10
"#;

    /// Plays per hour of day
    pub const PLAYS_BY_HOUR: &str = r#"
SELECT t.hour, COUNT(*) AS plays
FROM songplay sp
JOIN time t ON sp.start_time = t.start_time
GROUP BY t.hour
ORDER BY t.hour
"#;

    /// Plays per day of week, 0 = Sunday
    pub const PLAYS_BY_WEEKDAY: &str = r#"
SELECT t.weekday, COUNT(*) AS plays
FROM songplay sp
JOIN time t ON sp.start_time = t.start_time
GROUP BY t.weekday
ORDER BY t.weekday
"#;

    /// Plays and listeners by subscription level
    pub const LEVEL_SPLIT: &str = r#"
SELECT sp.level, COUNT(*) AS plays, COUNT(DISTINCT sp.user_id) AS users
FROM songplay sp
GROUP BY sp.level
ORDER BY sp.level
"#;
}
