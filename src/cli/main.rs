//! CLI binary entry point for songplay-etl

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use songplay_warehouse::cli::commands::init::{InitConfigArgs, handle_init_config};
#[cfg(feature = "cli")]
use songplay_warehouse::cli::commands::pipeline::{
    PipelineArgs, handle_create_tables, handle_etl, handle_run,
};
#[cfg(feature = "cli")]
use songplay_warehouse::cli::commands::query::{
    CountsArgs, QueryArgs, QueryPreset, handle_counts, handle_query,
};
#[cfg(feature = "cli")]
use songplay_warehouse::database::{WarehouseBackendType, config::CONFIG_FILENAME};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "songplay-etl")]
#[command(about = "Load song play logs into a star-schema warehouse")]
#[command(version)]
struct Cli {
    /// Warehouse configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the staging, fact and dimension tables
    CreateTables {
        /// Print the statements without connecting
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load staging tables and populate the star schema
    Etl {
        /// Print the statements without connecting
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recreate every table, then load and transform
    Run {
        /// Print the statements without connecting
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the row count of every table
    Counts {
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Execute SQL queries against the warehouse
    Query {
        /// SQL query to execute
        #[arg(required_unless_present = "preset", conflicts_with = "preset")]
        sql: Option<String>,
        /// Run a preset analytical query
        #[arg(short, long, value_enum)]
        preset: Option<QueryPresetArg>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Write a sample configuration file
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,
        /// Backend the sample targets
        #[arg(short, long, value_enum, default_value = "redshift")]
        backend: BackendArg,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Debug)]
enum QueryPresetArg {
    /// Most played songs
    TopSongs,
    /// Most played artists
    TopArtists,
    /// Plays per hour of day
    PlaysByHour,
    /// Plays per day of week
    PlaysByWeekday,
    /// Plays by subscription level
    LevelSplit,
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    Redshift,
    Duckdb,
}

#[cfg(feature = "cli")]
fn convert_preset(preset: QueryPresetArg) -> QueryPreset {
    match preset {
        QueryPresetArg::TopSongs => QueryPreset::TopSongs,
        QueryPresetArg::TopArtists => QueryPreset::TopArtists,
        QueryPresetArg::PlaysByHour => QueryPreset::PlaysByHour,
        QueryPresetArg::PlaysByWeekday => QueryPreset::PlaysByWeekday,
        QueryPresetArg::LevelSplit => QueryPreset::LevelSplit,
    }
}

#[cfg(feature = "cli")]
fn convert_backend(backend: BackendArg) -> WarehouseBackendType {
    match backend {
        BackendArg::Redshift => WarehouseBackendType::Redshift,
        BackendArg::Duckdb => WarehouseBackendType::DuckDB,
    }
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    // Logs go to stderr so stdout stays parseable
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config;
    let result = match cli.command {
        Commands::CreateTables { dry_run, json } => handle_create_tables(&PipelineArgs {
            config,
            dry_run,
            json,
        }),
        Commands::Etl { dry_run, json } => handle_etl(&PipelineArgs {
            config,
            dry_run,
            json,
        }),
        Commands::Run { dry_run, json } => handle_run(&PipelineArgs {
            config,
            dry_run,
            json,
        }),
        Commands::Counts { format } => handle_counts(&CountsArgs { config, format }),
        Commands::Query {
            sql,
            preset,
            format,
        } => {
            let args = QueryArgs {
                config,
                sql,
                preset: preset.map(convert_preset),
                format,
            };
            handle_query(&args)
        }
        Commands::InitConfig {
            output,
            backend,
            force,
        } => {
            let args = InitConfigArgs {
                output,
                backend: convert_backend(backend),
                force,
            };
            handle_init_config(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e.report());
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
