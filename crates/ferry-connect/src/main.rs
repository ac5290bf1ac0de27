//! ferry-connect - File source connector runtime
//!
//! # Architecture
//!
//! One task lists its share of an input folder, reads each file row by row
//! and writes the records as JSON lines to stdout. Files are moved to the
//! completed or error folder once all their records were delivered.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ Input folder│────▶│  FileSource  │────▶│   stdout    │
//! │   (*.csv)   │     │     Task     │     │ (JSON lines)│
//! └─────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Run the configured task
//! ferry-connect -c ferry.yaml
//!
//! # Validate configuration
//! ferry-connect -c ferry.yaml validate
//!
//! # Print the connector definition or config schema
//! ferry-connect definition
//! ferry-connect schema
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ferry_connect::config::{ConnectConfig, FileSourceConfig, StorageConfig};
use ferry_connect::source_runner;

#[derive(Parser)]
#[command(name = "ferry-connect")]
#[command(version, about = "File source connector: partitioned file ingestion into topics")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "FERRY_CONFIG", default_value = "ferry.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured file source task (default)
    Run,
    /// Validate configuration file
    Validate,
    /// Print the connector definition as JSON
    Definition,
    /// Print the JSON schema of the source settings
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Commands that don't need config
    match &cli.command {
        Some(Commands::Definition) => return show_definition(),
        Some(Commands::Schema) => return show_schema(),
        _ => {}
    }

    let config = ConnectConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Validate => validate_config(&config),
        Commands::Definition | Commands::Schema => unreachable!(), // handled above
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Records go to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(config: ConnectConfig) -> Result<()> {
    info!("Starting ferry-connect '{}'", config.runner.name);

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(16);
    let mut runner = tokio::spawn(async move { source_runner::run_source(&config, shutdown_rx).await });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            (&mut runner).await
        }
        result = &mut runner => result,
    };

    result
        .context("Source task panicked")?
        .context("Source task failed")?;
    Ok(())
}

fn validate_config(config: &ConnectConfig) -> Result<()> {
    println!("✓ Configuration valid!\n");

    println!("Storage:");
    match &config.storage {
        StorageConfig::Local { root } => println!("  Local: {}", root.display()),
    }
    println!();

    let source = &config.source;
    println!("Source:");
    println!("  Topic: {}", source.topic);
    println!("  Input folder: {}", source.input_folder);
    println!(
        "  Completed folder: {}",
        source
            .completed_folder
            .as_deref()
            .unwrap_or("(none, completed files are deleted)")
    );
    println!("  Error folder: {}", source.error_folder);
    println!(
        "  Task: {} of {}",
        source.task_hash % source.task_total,
        source.task_total
    );
    println!("  File cache size: {}", source.file_cache_size);
    println!("  Batch size: {}", source.batch_size);
    println!("  CSV delimiter: {:?}", source.csv_delimiter);
    println!();

    println!("Runner:");
    println!("  Name: {}", config.runner.name);
    println!("  Idle backoff: {}ms", config.runner.idle_backoff_ms);
    println!("  Max publish retries: {}", config.runner.max_publish_retries);

    Ok(())
}

fn show_definition() -> Result<()> {
    let json = FileSourceConfig::definition()
        .to_json_pretty()
        .context("Failed to serialize definition")?;
    println!("{}", json);
    Ok(())
}

fn show_schema() -> Result<()> {
    let schema = schemars::schema_for!(FileSourceConfig);
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    println!("{}", json);
    Ok(())
}
