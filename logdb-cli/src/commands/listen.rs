//! The `listen` command: run the consumption loop until Ctrl-C.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use humantime_serde::re::humantime;
use logdb_client::{CancellationToken, EventContext, EventId, HandlerError, LogDb};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::LogdbConfig;

/// Arguments for the `listen` command
#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Pause between polls, e.g. "500ms" or "5s" (defaults to poller.poll_interval)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Maximum events per fetch (defaults to poller.batch_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Treat every id up to and including this one as already consumed
    #[arg(long, value_name = "ID")]
    pub from: Option<EventId>,
}

pub async fn run(args: ListenArgs, config: &LogdbConfig) -> Result<()> {
    let mut client_config = config.client_config()?;
    if let Some(interval) = args.interval {
        client_config = client_config.with_poll_interval(interval);
    }
    if let Some(limit) = args.limit {
        client_config = client_config.with_batch_limit(limit);
    }
    client_config.validate()?;

    let mut client = LogDb::connect(&client_config)?;
    if let Some(from) = args.from {
        client = client.resume_from(from);
    }
    client
        .on_event(|ctx| async move {
            let line = serde_json::to_string(&render_event(&ctx))?;
            println!("{line}");
            Ok::<(), HandlerError>(())
        })
        .on_fail(|err, ctx| async move {
            warn!(event_id = ctx.id, error = %err, "Failed to print event");
        });

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Interrupted, stopping after the current round");
        signal.cancel();
    });

    let cursor = client.listen_until(shutdown).await;
    info!(cursor, "Stopped listening");
    Ok(())
}

/// One output line per event, with the payload decoded when it holds JSON text
fn render_event(ctx: &EventContext) -> Value {
    let payload = ctx
        .payload_as::<Value>()
        .unwrap_or_else(|_| ctx.payload.clone());
    json!({
        "id": ctx.id,
        "evt_type": ctx.event_type,
        "payload": payload,
        "timestamp": ctx.created_at,
    })
}
