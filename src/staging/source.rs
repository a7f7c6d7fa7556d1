//! Local JSON sources for the embedded warehouse
//!
//! Resolves a source location the way an object-store key prefix resolves,
//! reads every JSON record from the matched files and maps each record onto
//! the staging columns.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde_json::Value;
use tracing::debug;

use super::JsonFormat;
use super::error::StagingError;
use super::jsonpaths::JsonPaths;
use crate::sql::ColumnDef;

/// Find the files behind a source location
///
/// - a file is loaded on its own
/// - a directory is loaded recursively
/// - anything else is treated as a key prefix (`<location>*`), including
///   the contents of matching directories
///
/// Hidden files are skipped. Files are returned sorted by path so loads are
/// deterministic.
pub fn discover_files(location: &str) -> Result<Vec<PathBuf>, StagingError> {
    let location = location.strip_prefix("file://").unwrap_or(location);
    if location.contains("://") {
        return Err(StagingError::UnsupportedLocation(location.to_string()));
    }

    let base = Path::new(location);
    let mut files = Vec::new();

    if base.is_file() {
        files.push(base.to_path_buf());
    } else {
        let escaped = Pattern::escape(location.trim_end_matches('/'));
        let patterns = if base.is_dir() {
            vec![format!("{}/**/*", escaped)]
        } else {
            vec![format!("{}*", escaped), format!("{}*/**/*", escaped)]
        };
        for pattern in patterns {
            collect_files(&pattern, &mut files)?;
        }
    }

    files.sort();
    files.dedup();

    if files.is_empty() {
        return Err(StagingError::NoSourceFiles(location.to_string()));
    }

    debug!(location, files = files.len(), "Resolved source files");
    Ok(files)
}

fn collect_files(pattern: &str, files: &mut Vec<PathBuf>) -> Result<(), StagingError> {
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let entries = glob::glob_with(pattern, options)
        .map_err(|e| StagingError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    // An unreadable entry fails the load rather than loading what is left
    for entry in entries {
        let path = entry.map_err(|e| StagingError::SourceNotAccessible {
            path: e.path().display().to_string(),
            reason: e.error().to_string(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }

    Ok(())
}

/// Read every JSON object in a file
///
/// Records may be newline-delimited or simply concatenated. Any value that
/// is not an object fails the whole file.
pub fn read_json_records(path: &Path) -> Result<Vec<Value>, StagingError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| StagingError::SourceNotAccessible {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut records = Vec::new();
    let stream = serde_json::Deserializer::from_str(&content).into_iter::<Value>();

    for (index, item) in stream.enumerate() {
        let record = item.map_err(|e| StagingError::JsonParse {
            path: path.to_path_buf(),
            record: index + 1,
            error: e.to_string(),
        })?;

        if !record.is_object() {
            return Err(StagingError::NotAnObject {
                path: path.to_path_buf(),
                record: index + 1,
            });
        }
        records.push(record);
    }

    Ok(records)
}

/// How JSON records map onto staging columns
#[derive(Debug, Clone)]
pub enum ColumnMapping {
    /// Top-level keys equal to the column names
    Auto,
    /// One JSON path per column, by position
    Paths(JsonPaths),
}

impl ColumnMapping {
    /// Build the mapping for a load, reading the JSONPaths file if there is one
    pub fn for_format(format: &JsonFormat, columns: &[ColumnDef]) -> Result<Self, StagingError> {
        match format {
            JsonFormat::Auto => Ok(ColumnMapping::Auto),
            JsonFormat::JsonPaths(location) => {
                let location = location.strip_prefix("file://").unwrap_or(location);
                if location.contains("://") {
                    return Err(StagingError::UnsupportedLocation(location.to_string()));
                }
                let paths = JsonPaths::load(Path::new(location))?;
                paths.check_column_count(columns.len())?;
                Ok(ColumnMapping::Paths(paths))
            }
        }
    }

    /// Extract one row of column values from a record
    ///
    /// Values come back as SQL text for the engine to cast; `None` is NULL.
    pub fn row_values(&self, record: &Value, columns: &[ColumnDef]) -> Vec<Option<String>> {
        columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                let value = match self {
                    ColumnMapping::Auto => record.get(column.name),
                    ColumnMapping::Paths(paths) => paths
                        .paths()
                        .get(position)
                        .and_then(|path| path.evaluate(record)),
                };
                sql_text(value, column)
            })
            .collect()
    }
}

fn sql_text(value: Option<&Value>, column: &ColumnDef) -> Option<String> {
    match value? {
        Value::Null => None,
        // Empty strings only survive in text columns
        Value::String(s) if s.is_empty() && !column.is_text() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::schema::{STAGING_EVENTS_COLUMNS, STAGING_SONGS_COLUMNS};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_directory_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("A/B")).unwrap();
        fs::write(dir.path().join("A/B/TRABC.json"), "{}").unwrap();
        fs::write(dir.path().join("A/TRAAA.json"), "{}").unwrap();
        fs::write(dir.path().join(".DS_Store"), "junk").unwrap();

        let files = discover_files(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("A/B/TRABC.json"));
        assert!(files[1].ends_with("A/TRAAA.json"));
    }

    #[test]
    fn test_discover_key_prefix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2018-11-01-events.json"), "{}").unwrap();
        fs::write(dir.path().join("2018-11-02-events.json"), "{}").unwrap();
        fs::write(dir.path().join("2018-12-01-events.json"), "{}").unwrap();

        let prefix = format!("{}/2018-11", dir.path().display());
        let files = discover_files(&prefix).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_discover_errors() {
        assert!(matches!(
            discover_files("s3://udacity-dend/log_data"),
            Err(StagingError::UnsupportedLocation(_))
        ));

        let dir = TempDir::new().unwrap();
        let missing = format!("{}/nothing-here", dir.path().display());
        assert!(matches!(
            discover_files(&missing),
            Err(StagingError::NoSourceFiles(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_fails_on_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("readable.json"), "{}").unwrap();
        let locked = dir.path().join("2018");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("events.json"), "{}").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind root
        let bypassed = fs::read_dir(&locked).is_ok();
        let result = discover_files(dir.path().to_str().unwrap());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if bypassed {
            return;
        }

        match result {
            Err(StagingError::SourceNotAccessible { path, .. }) => assert!(path.contains("2018")),
            other => panic!("expected SourceNotAccessible, got {:?}", other),
        }
    }

    #[test]
    fn test_read_newline_delimited_and_concatenated_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            "{\"page\": \"Home\"}\n{\"page\": \"NextSong\"}\n{\n  \"page\": \"Logout\"\n}",
        )
        .unwrap();

        let records = read_json_records(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["page"], "Logout");
    }

    #[test]
    fn test_read_rejects_malformed_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"page\": \"Home\"}\n{\"page\": ").unwrap();
        assert!(matches!(
            read_json_records(&path),
            Err(StagingError::JsonParse { record: 2, .. })
        ));

        fs::write(&path, "{\"page\": \"Home\"}\n[1, 2]").unwrap();
        assert!(matches!(
            read_json_records(&path),
            Err(StagingError::NotAnObject { record: 2, .. })
        ));
    }

    #[test]
    fn test_auto_mapping_matches_column_names() {
        let record = json!({
            "num_songs": 1,
            "artist_id": "ARJIE2Y1187B994AB7",
            "artist_latitude": null,
            "artist_name": "Line Renaud",
            "title": "Der Kleine Dompfaff",
            "duration": 152.92036,
            "year": 0,
            "unknown_key": "ignored"
        });

        let row = ColumnMapping::Auto.row_values(&record, STAGING_SONGS_COLUMNS);
        assert_eq!(row.len(), STAGING_SONGS_COLUMNS.len());
        assert_eq!(row[0].as_deref(), Some("1"));
        assert_eq!(row[1].as_deref(), Some("ARJIE2Y1187B994AB7"));
        assert_eq!(row[2], None);
        assert_eq!(row[3], None); // artist_longitude missing
        assert_eq!(row[8].as_deref(), Some("152.92036"));
        assert_eq!(row[9].as_deref(), Some("0"));
    }

    #[test]
    fn test_jsonpaths_mapping_by_position() {
        let dir = TempDir::new().unwrap();
        let paths_file = dir.path().join("log_json_path.json");
        let expressions: Vec<String> = STAGING_EVENTS_COLUMNS
            .iter()
            .map(|c| format!("$['{}']", c.name))
            .collect();
        fs::write(
            &paths_file,
            serde_json::to_string(&json!({ "jsonpaths": expressions })).unwrap(),
        )
        .unwrap();

        let mapping = ColumnMapping::for_format(
            &JsonFormat::JsonPaths(paths_file.display().to_string()),
            STAGING_EVENTS_COLUMNS,
        )
        .unwrap();

        let record = json!({
            "artist": null,
            "auth": "Logged Out",
            "gender": "",
            "page": "Home",
            "ts": 1541988115796_i64,
            "userId": ""
        });
        let row = mapping.row_values(&record, STAGING_EVENTS_COLUMNS);

        assert_eq!(row[0], None);
        assert_eq!(row[1].as_deref(), Some("Logged Out"));
        assert_eq!(row[3].as_deref(), Some("")); // gender is text
        assert_eq!(row[10].as_deref(), Some("Home"));
        assert_eq!(row[15].as_deref(), Some("1541988115796"));
        assert_eq!(row[17], None); // empty userId is NULL for INTEGER
    }

    #[test]
    fn test_jsonpaths_mapping_requires_one_path_per_column() {
        let dir = TempDir::new().unwrap();
        let paths_file = dir.path().join("short.json");
        fs::write(&paths_file, r#"{"jsonpaths": ["$['artist']"]}"#).unwrap();

        let result = ColumnMapping::for_format(
            &JsonFormat::JsonPaths(paths_file.display().to_string()),
            STAGING_EVENTS_COLUMNS,
        );
        assert!(matches!(result, Err(StagingError::JsonPaths(_))));
    }
}
