use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use logdb_client::Token;
use logdb_client::config::{TOKEN_ENV, URL_ENV};

use super::types::{
    LogdbConfig, PollerSection, RawLogdbConfig, RawPollerConfig, RawServerConfig, ServerConfig,
};

/// Overrides the directory holding the project config file
pub const PROJECT_CONFIG_DIR_ENV: &str = "LOGDB_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration: files, then environment, then `overrides`
    ///
    /// `extra` is an explicit config file (from `--config`) layered after the
    /// project file.
    pub fn load(extra: Option<&Path>, overrides: RawLogdbConfig) -> Result<LogdbConfig> {
        if let Some(path) = extra
            && !path.exists()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let files: Vec<PathBuf> = Self::file_layers(extra)
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        Self::load_layers(&files, |key| std::env::var(key).ok(), overrides)
    }

    /// Config files in merge order, labelled by layer
    pub fn file_layers(extra: Option<&Path>) -> Vec<(&'static str, PathBuf)> {
        let mut layers: Vec<_> = Self::user_config_path()
            .map(|path| ("user", path))
            .into_iter()
            .collect();
        layers.push(("project", Self::project_config_path()));
        if let Some(path) = extra {
            layers.push(("--config", path.to_path_buf()));
        }
        layers
    }

    /// Merge every existing file in order, then the environment layer, then `overrides`
    pub fn load_layers(
        files: &[PathBuf],
        lookup: impl Fn(&str) -> Option<String>,
        overrides: RawLogdbConfig,
    ) -> Result<LogdbConfig> {
        let mut raw = RawLogdbConfig::default();

        for path in files {
            if let Some(layer) = Self::read_file(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }

        raw = Self::merge_raw(raw, Self::env_layer(lookup));
        raw = Self::merge_raw(raw, overrides);

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "logdb").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with LOGDB_PROJECT_CONFIG_DIR
    pub fn project_config_path() -> PathBuf {
        Self::project_config_path_from(std::env::var(PROJECT_CONFIG_DIR_ENV).ok())
    }

    fn project_config_path_from(dir: Option<String>) -> PathBuf {
        match dir {
            Some(dir) => PathBuf::from(dir).join("config.toml"),
            None => PathBuf::from(".logdb/config.toml"),
        }
    }

    fn read_file(path: &Path) -> Result<Option<RawLogdbConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Values taken from `LOGDB_URL` and `LOGDB_TOKEN`
    fn env_layer(lookup: impl Fn(&str) -> Option<String>) -> RawLogdbConfig {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        RawLogdbConfig {
            server: RawServerConfig {
                url: non_empty(URL_ENV),
                token: non_empty(TOKEN_ENV),
                request_timeout: None,
            },
            poller: RawPollerConfig::default(),
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawLogdbConfig, overlay: RawLogdbConfig) -> RawLogdbConfig {
        RawLogdbConfig {
            server: RawServerConfig {
                url: overlay.server.url.or(base.server.url),
                token: overlay.server.token.or(base.server.token),
                request_timeout: overlay
                    .server
                    .request_timeout
                    .or(base.server.request_timeout),
            },
            poller: RawPollerConfig {
                poll_interval: overlay.poller.poll_interval.or(base.poller.poll_interval),
                batch_limit: overlay.poller.batch_limit.or(base.poller.batch_limit),
                max_conflict_retries: overlay
                    .poller
                    .max_conflict_retries
                    .or(base.poller.max_conflict_retries),
                conflict_backoff: overlay
                    .poller
                    .conflict_backoff
                    .or(base.poller.conflict_backoff),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawLogdbConfig) -> LogdbConfig {
        let server = ServerConfig::default();
        let poller = PollerSection::default();
        LogdbConfig {
            server: ServerConfig {
                url: raw.server.url,
                token: raw.server.token.map(Token::new),
                request_timeout: raw.server.request_timeout.unwrap_or(server.request_timeout),
            },
            poller: PollerSection {
                poll_interval: raw.poller.poll_interval.unwrap_or(poller.poll_interval),
                batch_limit: raw.poller.batch_limit.unwrap_or(poller.batch_limit),
                max_conflict_retries: raw
                    .poller
                    .max_conflict_retries
                    .unwrap_or(poller.max_conflict_retries),
                conflict_backoff: raw.poller.conflict_backoff.unwrap_or(poller.conflict_backoff),
            },
        }
    }
}
