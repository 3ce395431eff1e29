//! crossdb CLI - schema provisioning and table transfer for Oracle and MySQL.

use clap::{Parser, Subcommand};
use crossdb::core::traits::Dialect;
use crossdb::{
    dump_table, populate_table, BindParams, Config, DbError, DbType, DialectImpl, Engine, Schema,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "crossdb")]
#[command(about = "Cross-dialect schema and data tool for Oracle and MySQL/MariaDB")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "crossdb.yaml")]
    config: PathBuf,

    /// Connection URI, overrides the configuration file
    #[arg(long)]
    uri: Option<String>,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the database connection
    HealthCheck,

    /// Create every object of a YAML schema file
    ApplySchema {
        /// Schema file
        file: PathBuf,

        /// Log the DDL without executing it
        #[arg(long)]
        simulate: bool,

        /// Fail when a table or sequence already exists
        #[arg(long)]
        fail_if_exists: bool,
    },

    /// Dump a table to a line-JSON file
    Dump {
        #[arg(long)]
        table: String,

        #[arg(long)]
        output: PathBuf,
    },

    /// Load a line-JSON file into a table
    Restore {
        #[arg(long)]
        table: String,

        #[arg(long)]
        input: PathBuf,
    },

    /// Print the insert-or-update statement for a table
    UpsertSql {
        /// Dialect: oracle or mysql
        #[arg(long)]
        db_type: String,

        #[arg(long)]
        table: String,

        /// Key column (repeatable)
        #[arg(long = "key", required = true)]
        keys: Vec<String>,

        /// Column updated on conflict (repeatable)
        #[arg(long = "update")]
        updates: Vec<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), DbError> {
    let cli = Cli::parse();

    // Pure rendering, no configuration or connection
    if let Commands::UpsertSql {
        db_type,
        table,
        keys,
        updates,
    } = &cli.command
    {
        let db_type: DbType = db_type.parse()?;
        let dialect = DialectImpl::for_type(db_type);
        println!("{}", dialect.build_upsert_query(table, keys, updates));
        return Ok(());
    }

    setup_logging(&cli.verbosity, &cli.log_format).map_err(DbError::Config)?;

    let mut config = load_config(&cli.config, cli.uri.as_deref())?;

    match cli.command {
        Commands::UpsertSql { .. } => unreachable!(), // Handled above

        Commands::HealthCheck => {
            let uri = config.connection_uri()?;
            let mut engine = Engine::from_config(&config)?;
            let started = Instant::now();
            engine.connect()?;
            let probe = match uri.db_type {
                DbType::Oracle => "SELECT 1 AS OK FROM DUAL",
                DbType::Mysql => "SELECT 1 AS OK",
            };
            engine.execute_quiet(probe, &BindParams::new())?;
            println!("Health Check Results:");
            println!("  {}: OK ({}ms)", uri.redacted(), started.elapsed().as_millis());
            engine.disconnect()?;
        }

        Commands::ApplySchema {
            file,
            simulate,
            fail_if_exists,
        } => {
            let schema = Schema::load(&file)?;
            schema.validate()?;
            if simulate {
                config.engine.simulate = true;
            }

            let mut engine = Engine::from_config(&config)?;
            engine.connect()?;
            engine.create_schema(&schema, fail_if_exists)?;
            engine.disconnect()?;

            let status_msg = if simulate { "Simulated" } else { "Applied" };
            println!(
                "{} schema {} ({} tables, {} sequences, {} foreign keys)",
                status_msg,
                schema.name,
                schema.tables.len(),
                schema.sequences.len(),
                schema.foreign_keys.len()
            );
        }

        Commands::Dump { table, output } => {
            let mut engine = Engine::from_config(&config)?;
            engine.connect()?;
            let writer = BufWriter::new(File::create(&output)?);
            let stats = dump_table(&mut engine, &table, writer)?;
            engine.disconnect()?;

            println!("Dumped {} rows from {} to {:?}", stats.rows, table, output);
            println!("  Duration: {:.2}s", stats.duration.as_secs_f64());
        }

        Commands::Restore { table, input } => {
            let reader = BufReader::new(File::open(&input)?);
            let mut engine = Engine::from_config(&config)?;
            engine.connect()?;
            let stats = populate_table(&mut engine, &table, reader, |rows| {
                info!("{}: {} rows restored", table, rows);
            })?;
            engine.disconnect()?;

            println!("Restored {} rows into {}", stats.rows, table);
            println!("  Commits: {}", stats.commits);
            println!("  Duration: {:.2}s", stats.duration.as_secs_f64());
        }
    }

    Ok(())
}

/// Load the configuration file, or build one from `--uri` alone when the
/// file does not exist.
fn load_config(path: &Path, uri: Option<&str>) -> Result<Config, DbError> {
    match uri {
        Some(uri) if !path.exists() => Config::from_uri(uri),
        Some(uri) => {
            let mut config = Config::load(path)?;
            config.database.uri = uri.to_string();
            config.validate()?;
            Ok(config)
        }
        None => {
            if !path.exists() {
                return Err(DbError::Config(format!(
                    "Configuration file not found: {:?}",
                    path
                )));
            }
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format '{}' (expected text or json)", other)),
    }

    Ok(())
}
