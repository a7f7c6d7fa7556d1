//! INSERT/SELECT statements populating the star schema from staging
//!
//! Each statement reads only the staging tables and appends to one warehouse
//! table. None of them depend on each other, but all of them require the
//! staging load to have completed.

use serde::{Deserialize, Serialize};

use super::{Dialect, Statement, WarehouseTable};

/// How the `users` dimension handles a user whose `level` differs across events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevelPolicy {
    /// One row per distinct attribute combination. A level change yields two
    /// rows for the same `user_id` and the insert fails on the primary key.
    #[default]
    Distinct,
    /// One row per user, taken from the user's latest event.
    Latest,
}

impl std::str::FromStr for UserLevelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "distinct" => Ok(UserLevelPolicy::Distinct),
            "latest" => Ok(UserLevelPolicy::Latest),
            _ => Err(format!(
                "Unknown user level policy: {}. Use 'distinct' or 'latest'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for UserLevelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserLevelPolicy::Distinct => write!(f, "distinct"),
            UserLevelPolicy::Latest => write!(f, "latest"),
        }
    }
}

/// Dialect-independent insert statements
pub mod insert_sql {
    pub const USERS_DISTINCT: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT DISTINCT userId, firstName, lastName, gender, level
FROM staging_events
WHERE userId IS NOT NULL
"#;

    pub const USERS_LATEST: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT user_id, first_name, last_name, gender, level
FROM (
    SELECT userId AS user_id,
           firstName AS first_name,
           lastName AS last_name,
           gender,
           level,
           ROW_NUMBER() OVER (
               PARTITION BY userId
               ORDER BY CAST(ts AS BIGINT) DESC NULLS LAST
           ) AS event_rank
    FROM staging_events
    WHERE userId IS NOT NULL
) AS ranked_events
WHERE event_rank = 1
"#;

    pub const SONGS: &str = r#"
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT DISTINCT song_id, title, artist_id, year, duration
FROM staging_songs
WHERE song_id IS NOT NULL
"#;

    pub const ARTISTS: &str = r#"
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT DISTINCT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
FROM staging_songs
WHERE artist_id IS NOT NULL
"#;
}

/// Fact rows: song plays matched to the song catalog by artist name and title
pub fn songplay_insert(dialect: Dialect) -> String {
    format!(
        r#"
INSERT INTO songplay (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT {start_time} AS start_time,
       e.userId,
       e.level,
       s.song_id,
       s.artist_id,
       e.sessionId,
       e.location,
       e.userAgent
FROM staging_events e
INNER JOIN staging_songs s
    ON e.artist = s.artist_name
   AND e.song = s.title
WHERE e.page = 'NextSong'
"#,
        start_time = dialect.epoch_millis_to_timestamp("e.ts")
    )
}

/// Time dimension: every distinct event timestamp with its calendar parts
pub fn time_insert(dialect: Dialect) -> String {
    format!(
        r#"
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT DISTINCT start_time,
       EXTRACT(hour FROM start_time),
       EXTRACT(day FROM start_time),
       EXTRACT(week FROM start_time),
       EXTRACT(month FROM start_time),
       EXTRACT(year FROM start_time),
       EXTRACT({weekday} FROM start_time)
FROM (
    SELECT {start_time} AS start_time
    FROM staging_events
    WHERE ts IS NOT NULL
) AS event_times
"#,
        start_time = dialect.epoch_millis_to_timestamp("ts"),
        weekday = dialect.weekday_part()
    )
}

/// The five transform statements in execution order
pub fn insert_table_queries(dialect: Dialect, policy: UserLevelPolicy) -> Vec<Statement> {
    let users = match policy {
        UserLevelPolicy::Distinct => insert_sql::USERS_DISTINCT,
        UserLevelPolicy::Latest => insert_sql::USERS_LATEST,
    };

    vec![
        Statement::new(
            "insert songplay",
            WarehouseTable::Songplay,
            songplay_insert(dialect).trim(),
        ),
        Statement::new("insert users", WarehouseTable::Users, users.trim()),
        Statement::new("insert songs", WarehouseTable::Songs, insert_sql::SONGS.trim()),
        Statement::new(
            "insert artists",
            WarehouseTable::Artists,
            insert_sql::ARTISTS.trim(),
        ),
        Statement::new(
            "insert time",
            WarehouseTable::Time,
            time_insert(dialect).trim(),
        ),
    ]
}
