//! One-shot consumer commands: `fetch`, `ack` and `nack`.

use anyhow::{Context, Result};
use clap::Args;
use logdb_client::{EventId, LogDb};
use tracing::info;

use super::emit::ensure_accepted;
use crate::config::LogdbConfig;

/// Arguments for the `fetch` command
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Maximum events to fetch (defaults to poller.batch_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the `ack` command
#[derive(Debug, Args)]
pub struct AckArgs {
    /// Highest event id consumed
    pub id: EventId,
}

/// Print the next batch without acknowledging it
pub async fn run_fetch(args: FetchArgs, config: &LogdbConfig) -> Result<()> {
    let client_config = config.client_config()?;
    let limit = args.limit.unwrap_or(client_config.batch_limit);
    let client = LogDb::connect(&client_config)?;

    let events = client
        .fetch_events(limit)
        .await
        .context("Failed to fetch events")?;

    println!("{}", serde_json::to_string_pretty(&events)?);
    info!(count = events.len(), "Fetched events");
    Ok(())
}

pub async fn run_ack(args: AckArgs, config: &LogdbConfig) -> Result<()> {
    let client = LogDb::connect(&config.client_config()?)?;

    let accepted = client
        .ack(args.id)
        .await
        .with_context(|| format!("Failed to acknowledge event {}", args.id))?;
    ensure_accepted(accepted, "ack")?;

    info!(event_id = args.id, "Acknowledged");
    Ok(())
}

pub async fn run_nack(config: &LogdbConfig) -> Result<()> {
    let client = LogDb::connect(&config.client_config()?)?;

    let accepted = client.nack().await.context("Failed to send nack")?;
    ensure_accepted(accepted, "nack")?;

    info!("Released in-flight reads");
    Ok(())
}
