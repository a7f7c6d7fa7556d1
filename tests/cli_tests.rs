//! Integration tests for CLI

#[cfg(feature = "cli")]
use songplay_warehouse::cli::CliError;
#[cfg(feature = "cli")]
use songplay_warehouse::cli::commands::init::{InitConfigArgs, handle_init_config};
#[cfg(feature = "cli")]
use songplay_warehouse::cli::commands::pipeline::{PipelineArgs, handle_create_tables, handle_run};
#[cfg(feature = "cli")]
use songplay_warehouse::database::WarehouseBackendType;
#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::Path;
#[cfg(feature = "cli")]
use std::process::Command;
#[cfg(feature = "cli")]
use tempfile::TempDir;

#[cfg(feature = "cli")]
const EVENT: &str = r#"{"artist":"Artist One","auth":"Logged In","firstName":"Kaylee","gender":"F","itemInSession":0,"lastName":"Summers","length":218.93,"level":"free","location":"Phoenix, AZ","method":"PUT","page":"NextSong","registration":1540344794796.0,"sessionId":139,"song":"Song One","status":200,"ts":1541988115796,"userAgent":"Mozilla/5.0","userId":"8"}"#;

#[cfg(feature = "cli")]
const SONG: &str = r#"{"num_songs":1,"artist_id":"A1","artist_latitude":null,"artist_longitude":null,"artist_location":"","artist_name":"Artist One","song_id":"S1","title":"Song One","duration":218.93,"year":2004}"#;

#[cfg(feature = "cli")]
const JSONPATHS: &str = r#"{"jsonpaths":["$['artist']","$['auth']","$['firstName']","$['gender']","$['itemInSession']","$['lastName']","$['length']","$['level']","$['location']","$['method']","$['page']","$['registration']","$['sessionId']","$['song']","$['status']","$['ts']","$['userAgent']","$['userId']"]}"#;

/// Write local sources and a DuckDB configuration file pointing at them
#[cfg(feature = "cli")]
fn duckdb_workspace(root: &Path) -> std::path::PathBuf {
    fs::create_dir_all(root.join("data/log_data")).unwrap();
    fs::create_dir_all(root.join("data/song_data/A")).unwrap();
    fs::write(root.join("data/log_data/events.json"), EVENT).unwrap();
    fs::write(root.join("data/song_data/A/TRA.json"), SONG).unwrap();
    fs::write(root.join("data/log_json_path.json"), JSONPATHS).unwrap();

    let data = root.join("data");
    let config = format!(
        r#"[warehouse]
backend = "duckdb"
duckdb_path = "sparkify.duckdb"

[sources]
log_data = "{}"
log_jsonpath = "{}"
song_data = "{}"
"#,
        data.join("log_data").display(),
        data.join("log_json_path.json").display(),
        data.join("song_data").display()
    );
    let path = root.join("dwh.toml");
    fs::write(&path, config).unwrap();
    path
}

#[cfg(all(feature = "cli", feature = "duckdb-backend"))]
#[test]
fn test_cli_run_populates_duckdb_file() {
    let dir = TempDir::new().unwrap();
    let config = duckdb_workspace(dir.path());

    let args = PipelineArgs {
        config,
        dry_run: false,
        json: true,
    };
    handle_run(&args).unwrap();

    // The database lands next to the configuration file
    let db_path = dir.path().join("sparkify.duckdb");
    assert!(db_path.exists());

    let conn = duckdb::Connection::open(&db_path).unwrap();
    let plays: i64 = conn
        .query_row("SELECT COUNT(*) FROM songplay", [], |row| row.get(0))
        .unwrap();
    assert_eq!(plays, 1);

    // Empty location strings stay empty in text columns
    let location: String = conn
        .query_row("SELECT location FROM artists", [], |row| row.get(0))
        .unwrap();
    assert_eq!(location, "");
}

#[cfg(feature = "cli")]
#[test]
fn test_cli_dry_run_does_not_create_database() {
    let dir = TempDir::new().unwrap();
    let config = duckdb_workspace(dir.path());

    let args = PipelineArgs {
        config,
        dry_run: true,
        json: false,
    };
    handle_run(&args).unwrap();
    assert!(!dir.path().join("sparkify.duckdb").exists());
}

#[cfg(feature = "cli")]
#[test]
fn test_cli_redshift_requires_cluster_settings() {
    let dir = TempDir::new().unwrap();
    let args = PipelineArgs {
        config: dir.path().join("missing.toml"),
        dry_run: false,
        json: false,
    };

    let err = handle_create_tables(&args).unwrap_err();
    assert!(matches!(err, CliError::DatabaseError(_)));
    assert!(err.to_string().contains("cluster.host"));
}

#[cfg(feature = "cli")]
#[test]
fn test_cli_init_config_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("dwh.toml");
    fs::write(&output, "# existing").unwrap();

    let args = InitConfigArgs {
        output: output.clone(),
        backend: WarehouseBackendType::DuckDB,
        force: false,
    };
    assert!(matches!(
        handle_init_config(&args),
        Err(CliError::FileExists(_))
    ));
    assert_eq!(fs::read_to_string(&output).unwrap(), "# existing");
}

#[cfg(feature = "cli")]
#[test]
fn test_binary_exits_nonzero_with_error_report() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_songplay-etl"))
        .args(["--config", "missing.toml", "create-tables"])
        .current_dir(dir.path())
        .env_remove("DWH_BACKEND")
        .env_remove("DWH_HOST")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Configuration error: Missing required settings"));
}

#[cfg(feature = "cli")]
#[test]
fn test_binary_dry_run_prints_json_plan() {
    let dir = TempDir::new().unwrap();
    let config = duckdb_workspace(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_songplay-etl"))
        .arg("--config")
        .arg(&config)
        .args(["etl", "--dry-run", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["dialect"], "duckdb");
    assert_eq!(report["steps"].as_array().unwrap().len(), 7);
}
