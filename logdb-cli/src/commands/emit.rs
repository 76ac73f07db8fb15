//! Producer commands: `emit` and `emit-bulk`.

use std::io::Read;

use anyhow::{Context, Result};
use clap::Args;
use logdb_client::LogDb;
use serde_json::Value;
use tracing::info;

use crate::config::LogdbConfig;

/// Arguments for the `emit` command
#[derive(Debug, Args)]
pub struct EmitArgs {
    /// Event type
    #[arg(short = 't', long = "type")]
    pub event_type: String,

    /// Event payload as JSON (reads from stdin if omitted)
    #[arg(short, long)]
    pub data: Option<String>,
}

/// Arguments for the `emit-bulk` command
#[derive(Debug, Args)]
pub struct EmitBulkArgs {
    /// Event type shared by every payload
    #[arg(short = 't', long = "type")]
    pub event_type: String,

    /// JSON array of payloads (reads from stdin if omitted)
    #[arg(short, long)]
    pub data: Option<String>,
}

/// Write one event
pub async fn run(args: EmitArgs, config: &LogdbConfig) -> Result<()> {
    let payload = parse_payload(&read_data(args.data)?)?;
    let client = LogDb::connect(&config.client_config()?)?;

    let accepted = client
        .emit(&args.event_type, &payload)
        .await
        .context("Failed to write event")?;
    ensure_accepted(accepted, "write")?;

    info!(event_type = %args.event_type, "Event written");
    Ok(())
}

/// Write one event per array element, sharing one timestamp
pub async fn run_bulk(args: EmitBulkArgs, config: &LogdbConfig) -> Result<()> {
    let payloads = parse_payloads(&read_data(args.data)?)?;
    let client = LogDb::connect(&config.client_config()?)?;

    let accepted = client
        .emit_bulk(&args.event_type, &payloads)
        .await
        .context("Failed to write events")?;
    ensure_accepted(accepted, "write")?;

    info!(event_type = %args.event_type, count = payloads.len(), "Events written");
    Ok(())
}

/// Fail the command when the server answered with a non-200 success status
pub fn ensure_accepted(accepted: bool, operation: &str) -> Result<()> {
    if !accepted {
        anyhow::bail!("Server did not accept the {operation} (expected 200 OK)");
    }
    Ok(())
}

/// Read payload from --data or stdin
fn read_data(data: Option<String>) -> Result<String> {
    match data {
        Some(data) => Ok(data),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn parse_payload(input: &str) -> Result<Value> {
    serde_json::from_str(input).context("Failed to parse payload JSON")
}

fn parse_payloads(input: &str) -> Result<Vec<Value>> {
    match parse_payload(input)? {
        Value::Array(items) => Ok(items),
        other => anyhow::bail!(
            "Expected a JSON array of payloads, got {}",
            kind_of(&other)
        ),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
