//! curator - run MongoDB administration scripts
//!
//! Usage:
//!   curator list                     List the available scripts
//!   curator show <script>            Print a script's commands (no database access)
//!   curator run <script>             Run every command of a script
//!   curator indexes ensure           Create the application indexes that are missing
//!   curator indexes ensure --reset   Drop and recreate them
//!   curator indexes drop-all         Drop every index except _id_
//!
//! Connection settings come from MONGODB_URI and MONGODB_DB (a `.env` file
//! is loaded when present) and can be overridden with --uri / --db.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use curator_mongodb::scripts::{self, Script, CATALOG};
use curator_mongodb::{
    drop_all_indexes, ensure_indexes, Command, CommandRunner, Connection, ConnectionConfig,
    EnsureAction, RunSummary,
};

#[derive(Parser)]
#[command(name = "curator")]
#[command(about = "Run MongoDB administration scripts", long_about = None)]
#[command(version)]
struct Cli {
    /// MongoDB connection string (overrides MONGODB_URI)
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Database name (overrides MONGODB_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available scripts
    List,

    /// Print the commands of a script without connecting
    Show {
        /// Script name (see `curator list`)
        script: String,
    },

    /// Run every command of a script
    ///
    /// Failures are logged per command; the exit code is unaffected.
    Run {
        /// Script name (see `curator list`)
        script: String,
    },

    /// Maintain the application index set
    Indexes {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create each application index unless one with that name exists
    Ensure {
        /// Drop existing indexes with the same name and recreate them
        #[arg(long)]
        reset: bool,
    },

    /// Drop every index except _id_ in every collection
    DropAll,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::List => list_scripts(),
        Commands::Show { script } => show_script(&script)?,
        Commands::Run { script } => {
            let script = scripts::script(&script)?;
            let config = connection_config(cli.uri, cli.db)?;
            runtime()?.block_on(run_script(&config, &script))?;
        }
        Commands::Indexes { action } => {
            let config = connection_config(cli.uri, cli.db)?;
            let rt = runtime()?;
            match action {
                IndexAction::Ensure { reset } => rt.block_on(run_ensure(&config, reset))?,
                IndexAction::DropAll => rt.block_on(run_drop_all(&config))?,
            }
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}

/// Environment first, then command-line overrides
fn connection_config(uri: Option<String>, db: Option<String>) -> Result<ConnectionConfig> {
    let mut config = match uri {
        Some(uri) => match ConnectionConfig::from_env() {
            Ok(config) => config.uri(uri),
            Err(_) => ConnectionConfig::new(
                uri,
                std::env::var("MONGODB_DB")
                    .unwrap_or_else(|_| curator_mongodb::DEFAULT_DATABASE.to_string()),
            ),
        },
        None => ConnectionConfig::from_env().context("Set MONGODB_URI or pass --uri")?,
    };

    if let Some(db) = db {
        config = config.database(db);
    }

    Ok(config)
}

async fn connect(config: &ConnectionConfig) -> Result<Connection> {
    let connection = Connection::connect(config)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", config.database))?;
    info!("Connected to database '{}'", config.database);
    Ok(connection)
}

fn list_scripts() {
    println!("📋 Scripts:");
    let width = CATALOG.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in CATALOG {
        println!("  {:<width$}  {}", entry.name, entry.description, width = width);
    }
}

fn show_script(name: &str) -> Result<()> {
    let script = scripts::script(name)?;
    println!("# {} - {}", script.name, script.description);
    for command in &script.commands {
        println!("{}", command_json(command)?);
    }
    Ok(())
}

/// Relaxed extended JSON, the form mongosh prints
fn command_json(command: &Command) -> Result<String> {
    let value = bson::to_bson(command)
        .with_context(|| format!("Failed to serialize {}", command))?
        .into_relaxed_extjson();
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn run_script(config: &ConnectionConfig, script: &Script) -> Result<()> {
    let connection = connect(config).await?;
    let runner = CommandRunner::new(connection.store());
    let summary = runner.run_script(script).await;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(60));
    println!("✅ Succeeded: {}", summary.succeeded());
    println!("❌ Failed:    {}", summary.failed());
    println!("{}", "=".repeat(60));
}

async fn run_ensure(config: &ConnectionConfig, reset: bool) -> Result<()> {
    let connection = connect(config).await?;
    let store = connection.store();

    let results = ensure_indexes(&store, &scripts::app_indexes(), reset).await;

    let count = |action: EnsureAction| {
        results
            .iter()
            .filter(|r| matches!(r, Ok(a) if *a == action))
            .count()
    };
    let failed = results.iter().filter(|r| r.is_err()).count();

    println!(
        "Indexes: {} created, {} recreated, {} skipped, {} failed",
        count(EnsureAction::Created),
        count(EnsureAction::Recreated),
        count(EnsureAction::Skipped),
        failed
    );

    Ok(())
}

async fn run_drop_all(config: &ConnectionConfig) -> Result<()> {
    let connection = connect(config).await?;
    let summary = drop_all_indexes(&connection.store())
        .await
        .context("Failed to list collections")?;

    println!("🗑️  Dropped {} index(es)", summary.dropped.len());
    if !summary.failed_collections.is_empty() {
        println!(
            "❌ Could not drop indexes on: {}",
            summary.failed_collections.join(", ")
        );
    }

    Ok(())
}

/// Initialize the tracing subscriber
fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "curator",
            "run",
            "migrations",
            "--uri",
            "mongodb://db:27017",
            "--db",
            "movies",
        ]);
        assert_eq!(cli.uri.as_deref(), Some("mongodb://db:27017"));
        assert_eq!(cli.db.as_deref(), Some("movies"));
        assert!(matches!(cli.command, Commands::Run { script } if script == "migrations"));
    }

    #[test]
    fn test_parse_indexes_ensure_reset() {
        let cli = Cli::parse_from(["curator", "indexes", "ensure", "--reset"]);
        assert!(matches!(
            cli.command,
            Commands::Indexes {
                action: IndexAction::Ensure { reset: true }
            }
        ));
    }

    #[test]
    fn test_explicit_uri_and_db() {
        let config = connection_config(
            Some("mongodb://db:27017".to_string()),
            Some("movies".to_string()),
        )
        .unwrap();
        assert_eq!(config.uri, "mongodb://db:27017");
        assert_eq!(config.database, "movies");
    }

    #[test]
    fn test_command_json_is_relaxed() {
        let script = scripts::script("titles-timestamps").unwrap();
        let json = command_json(&script.commands[0]).unwrap();
        assert!(json.contains("\"deleteOne\""));
        assert!(json.contains("tt0117060"));

        let json = command_json(&script.commands[1]).unwrap();
        assert!(json.contains("\"$date\""));
        assert!(!json.contains("$numberLong"));
    }
}
