//! `config show` and `config path`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::config::{ConfigLoader, LogdbConfig};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML (token redacted)
    Show,
    /// List config files in merge order and whether each exists
    Path,
}

pub fn run(args: ConfigArgs, config: &LogdbConfig, extra: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let rendered = render(config)?;
            print!("{rendered}");
        }
        ConfigCommands::Path => {
            for line in describe_layers(extra) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn render(config: &LogdbConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

fn describe_layers(extra: Option<&Path>) -> Vec<String> {
    ConfigLoader::file_layers(extra)
        .into_iter()
        .map(|(label, path)| {
            let state = if path.exists() { "found" } else { "missing" };
            format!("{label:<9} {} ({state})", path.display())
        })
        .collect()
}
