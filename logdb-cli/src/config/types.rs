use std::time::Duration;

use logdb_client::{ClientConfig, ConflictPolicy, Token};
use serde::{Deserialize, Serialize, Serializer};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLogdbConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub poller: RawPollerConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Base URL of the LogDB service
    pub url: Option<String>,

    /// Bearer token
    pub token: Option<String>,

    /// Per-request timeout
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Poller config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPollerConfig {
    /// Pause between loop iterations
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,

    /// Maximum events per fetch
    pub batch_limit: Option<usize>,

    /// Nack + refetch rounds before a conflicted fetch gives up (0 = unbounded)
    pub max_conflict_retries: Option<u32>,

    /// Pause before each refetch after a conflict
    #[serde(default, with = "humantime_serde")]
    pub conflict_backoff: Option<Duration>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Default)]
pub struct LogdbConfig {
    pub server: ServerConfig,
    pub poller: PollerSection,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Base URL of the LogDB service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Bearer token, never printed
    #[serde(serialize_with = "redact", skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            url: None,
            token: None,
            request_timeout: defaults.request_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollerSection {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    pub batch_limit: usize,

    /// 0 means retry until the conflict clears
    pub max_conflict_retries: u32,

    #[serde(with = "humantime_serde")]
    pub conflict_backoff: Duration,
}

impl Default for PollerSection {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            poll_interval: defaults.poll_interval,
            batch_limit: defaults.batch_limit,
            max_conflict_retries: defaults.conflict.max_retries.unwrap_or(0),
            conflict_backoff: defaults.conflict.backoff,
        }
    }
}

/// Placeholder printed in place of the token
pub const REDACTED: &str = "[REDACTED]";

fn redact<S: Serializer>(token: &Option<Token>, serializer: S) -> Result<S::Ok, S::Error> {
    match token {
        Some(_) => serializer.serialize_str(REDACTED),
        None => serializer.serialize_none(),
    }
}

impl LogdbConfig {
    /// Build the client configuration, failing when the endpoint or token is missing.
    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let url = self.server.url.clone().ok_or_else(|| {
            anyhow::anyhow!("No LogDB url configured (use --url, LOGDB_URL or server.url)")
        })?;
        let token = self.server.token.clone().ok_or_else(|| {
            anyhow::anyhow!("No LogDB token configured (use --token, LOGDB_TOKEN or server.token)")
        })?;

        let max_retries = match self.poller.max_conflict_retries {
            0 => None,
            n => Some(n),
        };
        let config = ClientConfig::new(url, token)
            .with_request_timeout(self.server.request_timeout)
            .with_poll_interval(self.poller.poll_interval)
            .with_batch_limit(self.poller.batch_limit)
            .with_conflict_policy(ConflictPolicy {
                max_retries,
                backoff: self.poller.conflict_backoff,
            });
        config.validate()?;
        Ok(config)
    }
}
