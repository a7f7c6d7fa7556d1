//! Table definitions for the staging area and the star schema
//!
//! The DDL is shared between Redshift and DuckDB except for the `songplay`
//! surrogate key: Redshift uses `IDENTITY(0,1)` while DuckDB draws from a
//! sequence that starts at zero.

use super::{Dialect, Statement, WarehouseTable};

/// Name of the DuckDB sequence backing `songplay.songplay_id`
pub const SONGPLAY_SEQUENCE: &str = "songplay_id_seq";

/// A staging column and the SQL type values are cast to on load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
}

impl ColumnDef {
    const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }

    /// Whether the column holds text (empty strings are kept as-is)
    pub fn is_text(&self) -> bool {
        self.sql_type.starts_with("VARCHAR") || self.sql_type.starts_with("CHAR")
    }
}

/// `staging_events` columns, in the positional order JSONPaths map onto
pub const STAGING_EVENTS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("artist", "VARCHAR"),
    ColumnDef::new("auth", "VARCHAR"),
    ColumnDef::new("firstName", "VARCHAR"),
    ColumnDef::new("gender", "CHAR(1)"),
    ColumnDef::new("itemInSession", "INTEGER"),
    ColumnDef::new("lastName", "VARCHAR"),
    ColumnDef::new("length", "DECIMAL"),
    ColumnDef::new("level", "VARCHAR"),
    ColumnDef::new("location", "VARCHAR"),
    ColumnDef::new("method", "VARCHAR"),
    ColumnDef::new("page", "VARCHAR"),
    ColumnDef::new("registration", "DECIMAL"),
    ColumnDef::new("sessionId", "INTEGER"),
    ColumnDef::new("song", "VARCHAR"),
    ColumnDef::new("status", "INTEGER"),
    ColumnDef::new("ts", "VARCHAR"),
    ColumnDef::new("userAgent", "VARCHAR"),
    ColumnDef::new("userId", "INTEGER"),
];

/// `staging_songs` columns, matched by name against song metadata keys
pub const STAGING_SONGS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("num_songs", "INTEGER"),
    ColumnDef::new("artist_id", "VARCHAR"),
    ColumnDef::new("artist_latitude", "DECIMAL"),
    ColumnDef::new("artist_longitude", "DECIMAL"),
    ColumnDef::new("artist_location", "VARCHAR"),
    ColumnDef::new("artist_name", "VARCHAR"),
    ColumnDef::new("song_id", "VARCHAR"),
    ColumnDef::new("title", "VARCHAR"),
    ColumnDef::new("duration", "DECIMAL"),
    ColumnDef::new("year", "INTEGER"),
];

/// CREATE statements
pub mod create_sql {
    pub const STAGING_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS staging_events (
    artist VARCHAR,
    auth VARCHAR,
    firstName VARCHAR,
    gender CHAR(1),
    itemInSession INTEGER,
    lastName VARCHAR,
    length DECIMAL,
    level VARCHAR,
    location VARCHAR,
    method VARCHAR,
    page VARCHAR,
    registration DECIMAL,
    sessionId INTEGER,
    song VARCHAR,
    status INTEGER,
    ts VARCHAR,
    userAgent VARCHAR,
    userId INTEGER
)
"#;

    pub const STAGING_SONGS: &str = r#"
CREATE TABLE IF NOT EXISTS staging_songs (
    num_songs INTEGER,
    artist_id VARCHAR,
    artist_latitude DECIMAL,
    artist_longitude DECIMAL,
    artist_location VARCHAR,
    artist_name VARCHAR,
    song_id VARCHAR,
    title VARCHAR,
    duration DECIMAL,
    year INTEGER
)
"#;

    pub const SONGPLAY_REDSHIFT: &str = r#"
CREATE TABLE IF NOT EXISTS songplay (
    songplay_id INTEGER IDENTITY(0,1) PRIMARY KEY,
    start_time TIMESTAMP NOT NULL,
    user_id INTEGER NOT NULL,
    level VARCHAR,
    song_id VARCHAR,
    artist_id VARCHAR,
    session_id INTEGER,
    location VARCHAR,
    user_agent VARCHAR
)
"#;

    pub const SONGPLAY_SEQUENCE_DUCKDB: &str =
        "CREATE SEQUENCE IF NOT EXISTS songplay_id_seq START WITH 0 MINVALUE 0";

    pub const SONGPLAY_DUCKDB: &str = r#"
CREATE TABLE IF NOT EXISTS songplay (
    songplay_id INTEGER DEFAULT nextval('songplay_id_seq') PRIMARY KEY,
    start_time TIMESTAMP NOT NULL,
    user_id INTEGER NOT NULL,
    level VARCHAR,
    song_id VARCHAR,
    artist_id VARCHAR,
    session_id INTEGER,
    location VARCHAR,
    user_agent VARCHAR
)
"#;

    pub const USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    first_name VARCHAR,
    last_name VARCHAR,
    gender VARCHAR,
    level VARCHAR
)
"#;

    pub const SONGS: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    song_id VARCHAR PRIMARY KEY,
    title VARCHAR,
    artist_id VARCHAR,
    year INTEGER,
    duration DECIMAL
)
"#;

    pub const ARTISTS: &str = r#"
CREATE TABLE IF NOT EXISTS artists (
    artist_id VARCHAR PRIMARY KEY,
    name VARCHAR,
    location VARCHAR,
    latitude DECIMAL,
    longitude DECIMAL
)
"#;

    pub const TIME: &str = r#"
CREATE TABLE IF NOT EXISTS time (
    start_time TIMESTAMP PRIMARY KEY,
    hour INTEGER,
    day INTEGER,
    week INTEGER,
    month INTEGER,
    year INTEGER,
    weekday INTEGER
)
"#;
}

/// Drop statements for every table, in table order
///
/// On DuckDB the `songplay` sequence is dropped right after the table that
/// depends on it.
pub fn drop_table_queries(dialect: Dialect) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(WarehouseTable::ALL.len() + 1);

    for table in WarehouseTable::ALL {
        statements.push(Statement::new(
            format!("drop {}", table),
            table,
            format!("DROP TABLE IF EXISTS {}", table),
        ));

        if table == WarehouseTable::Songplay && dialect == Dialect::DuckDB {
            statements.push(Statement::new(
                format!("drop sequence {}", SONGPLAY_SEQUENCE),
                table,
                format!("DROP SEQUENCE IF EXISTS {}", SONGPLAY_SEQUENCE),
            ));
        }
    }

    statements
}

/// Create statements for every table, in table order
pub fn create_table_queries(dialect: Dialect) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(WarehouseTable::ALL.len() + 1);

    for table in WarehouseTable::ALL {
        let sql = match table {
            WarehouseTable::StagingEvents => create_sql::STAGING_EVENTS,
            WarehouseTable::StagingSongs => create_sql::STAGING_SONGS,
            WarehouseTable::Songplay => match dialect {
                Dialect::Redshift => create_sql::SONGPLAY_REDSHIFT,
                Dialect::DuckDB => {
                    statements.push(Statement::new(
                        format!("create sequence {}", SONGPLAY_SEQUENCE),
                        table,
                        create_sql::SONGPLAY_SEQUENCE_DUCKDB,
                    ));
                    create_sql::SONGPLAY_DUCKDB
                }
            },
            WarehouseTable::Users => create_sql::USERS,
            WarehouseTable::Songs => create_sql::SONGS,
            WarehouseTable::Artists => create_sql::ARTISTS,
            WarehouseTable::Time => create_sql::TIME,
        };

        statements.push(Statement::new(format!("create {}", table), table, sql.trim()));
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_order_matches_table_order() {
        let drops = drop_table_queries(Dialect::Redshift);
        let tables: Vec<WarehouseTable> = drops.iter().map(|s| s.table).collect();
        assert_eq!(tables, WarehouseTable::ALL.to_vec());
        assert_eq!(drops[6].sql, "DROP TABLE IF EXISTS time");
    }

    #[test]
    fn test_duckdb_sequence_follows_songplay() {
        let drops = drop_table_queries(Dialect::DuckDB);
        assert_eq!(drops.len(), 8);
        assert_eq!(drops[2].sql, "DROP TABLE IF EXISTS songplay");
        assert_eq!(drops[3].sql, "DROP SEQUENCE IF EXISTS songplay_id_seq");

        let creates = create_table_queries(Dialect::DuckDB);
        assert_eq!(creates.len(), 8);
        assert!(creates[2].sql.starts_with("CREATE SEQUENCE"));
        assert!(creates[3].sql.contains("nextval('songplay_id_seq')"));
    }

    #[test]
    fn test_redshift_songplay_uses_identity() {
        let creates = create_table_queries(Dialect::Redshift);
        assert_eq!(creates.len(), 7);
        let songplay = creates
            .iter()
            .find(|s| s.table == WarehouseTable::Songplay)
            .unwrap();
        assert!(songplay.sql.contains("IDENTITY(0,1)"));
        assert!(creates.iter().all(|s| s.sql.starts_with("CREATE TABLE IF NOT EXISTS")));
    }

    #[test]
    fn test_staging_ddl_matches_column_layout() {
        for (ddl, columns) in [
            (create_sql::STAGING_EVENTS, STAGING_EVENTS_COLUMNS),
            (create_sql::STAGING_SONGS, STAGING_SONGS_COLUMNS),
        ] {
            let body: Vec<&str> = ddl
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with("CREATE") && *line != ")")
                .collect();
            assert_eq!(body.len(), columns.len());
            for (line, column) in body.iter().zip(columns) {
                let expected = format!("{} {}", column.name, column.sql_type);
                assert_eq!(line.trim_end_matches(','), expected);
            }
        }
    }

    #[test]
    fn test_text_columns() {
        assert!(STAGING_EVENTS_COLUMNS[3].is_text()); // gender CHAR(1)
        assert!(!STAGING_EVENTS_COLUMNS[17].is_text()); // userId INTEGER
        assert!(STAGING_EVENTS_COLUMNS[15].is_text()); // ts VARCHAR
    }
}
