use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::{ConfigLoader, RawLogdbConfig, RawServerConfig};

#[derive(Parser)]
#[command(name = "logdb", about = "Produce to and consume from a LogDB event log")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// LogDB base URL (overrides LOGDB_URL and config files)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Bearer token (overrides LOGDB_TOKEN and config files)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Extra config file layered over the user and project files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one event
    Emit(commands::emit::EmitArgs),
    /// Write a JSON array of payloads as one batch
    EmitBulk(commands::emit::EmitBulkArgs),
    /// Print the next batch of events without acknowledging it
    Fetch(commands::consume::FetchArgs),
    /// Acknowledge consumption up to an event id
    Ack(commands::consume::AckArgs),
    /// Release this consumer's in-flight reads
    Nack,
    /// Consume events and print one JSON line each until Ctrl-C
    Listen(commands::listen::ListenArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

impl Cli {
    /// Command-line values as the highest-priority config layer
    fn overrides(&self) -> RawLogdbConfig {
        RawLogdbConfig {
            server: RawServerConfig {
                url: self.url.clone(),
                token: self.token.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::load(cli.config.as_deref(), cli.overrides())?;

    match cli.command {
        Commands::Emit(args) => commands::emit::run(args, &config).await,
        Commands::EmitBulk(args) => commands::emit::run_bulk(args, &config).await,
        Commands::Fetch(args) => commands::consume::run_fetch(args, &config).await,
        Commands::Ack(args) => commands::consume::run_ack(args, &config).await,
        Commands::Nack => commands::consume::run_nack(&config).await,
        Commands::Listen(args) => commands::listen::run(args, &config).await,
        Commands::Config(args) => commands::config::run(args, &config, cli.config.as_deref()),
    }
}
