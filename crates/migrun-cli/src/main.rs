mod input;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use migrun_config::{AppConfig, ConfigLoader};
use migrun_db::{MigrationRunner, RunStatus, SqliteConnector};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "migrun", version, about = "Apply named SQL migrations exactly once")]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ~/.migrun/config.yml if present.
    #[arg(long, env = "MIGRUN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config.
    #[arg(long, env = "MIGRUN_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Ledger table name, overriding the config.
    #[arg(long, global = true)]
    ledger_table: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations from a JSON or YAML document (`-` for stdin)
    Run { file: PathBuf },
    /// List migrations recorded in the ledger
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli)?;
    let connector = SqliteConnector::new(config.database.clone());
    let runner = MigrationRunner::new(connector, config.database.ledger_table.clone())?;

    match cli.command {
        Command::Run { file } => run(runner, file).await,
        Command::Status => status(runner).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        ConfigLoader::load_or_default(cli.config.as_deref()).context("failed to load config")?;
    if let Some(path) = &cli.database {
        config.database.path = path.clone();
    }
    if let Some(table) = &cli.ledger_table {
        config.database.ledger_table = table.clone();
    }
    Ok(config)
}

async fn run(runner: MigrationRunner<SqliteConnector>, file: PathBuf) -> Result<()> {
    let document = input::read_document(&file)?;
    info!(
        "running migrations from {} against {}",
        file.display(),
        runner.connector().config().path.display()
    );

    let (tx, mut rx) = watch::channel(RunStatus::Idle);
    let observer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            info!(target: "migrun::status", "{status}");
        }
    });

    let result = tokio::task::spawn_blocking(move || runner.run_value(&document, &tx))
        .await
        .context("migration task panicked")?;
    if let Err(e) = observer.await {
        warn!("status observer stopped unexpectedly: {e}");
    }

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(failure) => {
            if !failure.applied.is_empty() {
                error!(
                    "recorded before failure: {}",
                    failure.applied.join(", ")
                );
            }
            Err(failure.into())
        }
    }
}

async fn status(runner: MigrationRunner<SqliteConnector>) -> Result<()> {
    let entries = tokio::task::spawn_blocking(move || runner.ledger_entries())
        .await
        .context("ledger task panicked")??;

    if entries.is_empty() {
        println!("No migrations recorded.");
        return Ok(());
    }
    println!("{:>5}  {:<25}  name", "batch", "applied at");
    for entry in entries {
        println!(
            "{:>5}  {:<25}  {}",
            entry.batch,
            entry.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.name
        );
    }
    Ok(())
}
