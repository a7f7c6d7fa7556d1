//! JSONPaths mapping files
//!
//! A JSONPaths file lists one path expression per target column. Paths are
//! applied positionally: the first path fills the first column, and so on.
//!
//! ```json
//! {
//!     "jsonpaths": [
//!         "$['artist']",
//!         "$['auth']",
//!         "$.location.city",
//!         "$['tags'][0]"
//!     ]
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

use super::error::StagingError;

static RE_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:\['((?:[^'\\]|\\.)*)'\]|\["((?:[^"\\]|\\.)*)"\]|\.([A-Za-z_][A-Za-z0-9_]*)|\[(\d+)\])"#,
    )
    .expect("Invalid regex")
});

/// One step of a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

/// A parsed JSON path expression such as `$['song']` or `$.artist.name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    expression: String,
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Parse a single path expression
    pub fn parse(expression: &str) -> Result<Self, StagingError> {
        let trimmed = expression.trim();
        let mut rest = trimmed.strip_prefix('$').ok_or_else(|| {
            StagingError::JsonPaths(format!("path must start with '$': {}", expression))
        })?;

        let mut segments = Vec::new();
        while !rest.is_empty() {
            let captures = RE_SEGMENT.captures(rest).ok_or_else(|| {
                StagingError::JsonPaths(format!("unexpected '{}' in path {}", rest, expression))
            })?;

            let quoted = captures.get(1).or_else(|| captures.get(2));
            let segment = match (quoted, captures.get(3), captures.get(4)) {
                (Some(key), _, _) => PathSegment::Key(unescape(key.as_str())),
                (None, Some(key), _) => PathSegment::Key(key.as_str().to_string()),
                (None, None, Some(index)) => {
                    let index = index.as_str().parse().map_err(|_| {
                        StagingError::JsonPaths(format!(
                            "array index out of range in {}",
                            expression
                        ))
                    })?;
                    PathSegment::Index(index)
                }
                (None, None, None) => {
                    return Err(StagingError::JsonPaths(format!(
                        "unexpected '{}' in path {}",
                        rest, expression
                    )));
                }
            };

            segments.push(segment);
            rest = &rest[captures[0].len()..];
        }

        if segments.is_empty() {
            return Err(StagingError::JsonPaths(format!(
                "path selects the whole record: {}",
                expression
            )));
        }

        Ok(Self {
            expression: trimmed.to_string(),
            segments,
        })
    }

    /// The expression as written in the file
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve the path against a record, `None` when any step is missing
    pub fn evaluate<'a>(&self, record: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.segments
            .iter()
            .try_fold(record, |value, segment| match segment {
                PathSegment::Key(key) => value.as_object()?.get(key),
                PathSegment::Index(index) => value.as_array()?.get(*index),
            })
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Deserialize)]
struct JsonPathsFile {
    jsonpaths: Vec<String>,
}

/// An ordered list of JSON paths, one per target column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPaths {
    paths: Vec<JsonPath>,
}

impl JsonPaths {
    /// Parse the contents of a JSONPaths file
    pub fn parse(content: &str) -> Result<Self, StagingError> {
        let file: JsonPathsFile = serde_json::from_str(content)
            .map_err(|e| StagingError::JsonPaths(format!("not a JSONPaths document: {}", e)))?;

        let paths = file
            .jsonpaths
            .iter()
            .map(|expression| JsonPath::parse(expression))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { paths })
    }

    /// Load a JSONPaths file from the local filesystem
    pub fn load(path: &Path) -> Result<Self, StagingError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| StagingError::SourceNotAccessible {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[JsonPath] {
        &self.paths
    }

    /// Check that the file provides exactly one path per target column
    pub fn check_column_count(&self, columns: usize) -> Result<(), StagingError> {
        if self.paths.len() != columns {
            return Err(StagingError::JsonPaths(format!(
                "{} paths for {} columns",
                self.paths.len(),
                columns
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bracket_and_dot_segments() {
        let path = JsonPath::parse("$['song'].title[2]").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("song".to_string()),
                PathSegment::Key("title".to_string()),
                PathSegment::Index(2),
            ]
        );

        let quoted = JsonPath::parse(r#"$["user agent"]"#).unwrap();
        assert_eq!(
            quoted.segments(),
            &[PathSegment::Key("user agent".to_string())]
        );
    }

    #[test]
    fn test_parse_escaped_quote() {
        let path = JsonPath::parse(r"$['it\'s']").unwrap();
        assert_eq!(path.segments(), &[PathSegment::Key("it's".to_string())]);
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(JsonPath::parse("artist").is_err());
        assert!(JsonPath::parse("$").is_err());
        assert!(JsonPath::parse("$['artist'").is_err());
        assert!(JsonPath::parse("$.1st").is_err());
        assert!(JsonPath::parse("$[*]").is_err());
    }

    #[test]
    fn test_evaluate() {
        let record = json!({
            "artist": "Des'ree",
            "song": {"title": "You Gotta Be", "tags": ["pop", "soul"]},
            "userId": ""
        });

        let artist = JsonPath::parse("$['artist']").unwrap();
        assert_eq!(artist.evaluate(&record), Some(&json!("Des'ree")));

        let tag = JsonPath::parse("$.song.tags[1]").unwrap();
        assert_eq!(tag.evaluate(&record), Some(&json!("soul")));

        let missing = JsonPath::parse("$.song.year").unwrap();
        assert_eq!(missing.evaluate(&record), None);

        let wrong_shape = JsonPath::parse("$.artist[0]").unwrap();
        assert_eq!(wrong_shape.evaluate(&record), None);
    }

    #[test]
    fn test_jsonpaths_file() {
        let paths = JsonPaths::parse(
            r#"{"jsonpaths": ["$['artist']", "$['auth']", "$['firstName']"]}"#,
        )
        .unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths.paths()[2].expression(), "$['firstName']");
        assert!(paths.check_column_count(3).is_ok());
        assert!(paths.check_column_count(18).is_err());
    }

    #[test]
    fn test_jsonpaths_file_errors() {
        assert!(JsonPaths::parse(r#"["$['artist']"]"#).is_err());
        assert!(JsonPaths::parse(r#"{"jsonpaths": ["artist"]}"#).is_err());
    }
}
