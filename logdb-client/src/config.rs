//! Configuration for the LogDB client.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::transport::DEFAULT_FETCH_LIMIT;

/// Environment variable holding the service base URL.
pub const URL_ENV: &str = "LOGDB_URL";
/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "LOGDB_TOKEN";

/// Bearer credential sent on every request.
///
/// Debug output never shows the value.
#[derive(Clone)]
pub struct Token(SecretString);

impl Token {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token. Only the transport should need this.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether no token was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token([REDACTED])")
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Token::new)
    }
}

/// How a fetch reacts to a 409 conflict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConflictPolicy {
    /// Maximum nack + refetch rounds. `None` retries until the conflict clears.
    #[serde(default = "default_max_conflict_retries")]
    pub max_retries: Option<u32>,

    /// Pause between the nack and the refetch.
    #[serde(default = "default_conflict_backoff", with = "humantime_serde")]
    pub backoff: Duration,
}

fn default_max_conflict_retries() -> Option<u32> {
    Some(10)
}

fn default_conflict_backoff() -> Duration {
    Duration::from_millis(100)
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_conflict_retries(),
            backoff: default_conflict_backoff(),
        }
    }
}

impl ConflictPolicy {
    /// Retry until the conflict clears, with no pause.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            backoff: Duration::ZERO,
        }
    }

    /// Whether another round is allowed after `retries` rounds.
    #[must_use]
    pub fn allows(&self, retries: u32) -> bool {
        self.max_retries.is_none_or(|max| retries < max)
    }
}

/// Configuration for connecting to a LogDB service and polling it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base endpoint of the log service.
    #[serde(default)]
    pub url: String,

    /// Bearer credential.
    #[serde(default)]
    pub token: Token,

    /// Pause between consumption loop iterations.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum events requested per fetch.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Per-request timeout on the HTTP transport.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Conflict handling for fetches.
    #[serde(default)]
    pub conflict: ConflictPolicy,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_batch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: Token::default(),
            poll_interval: default_poll_interval(),
            batch_limit: default_batch_limit(),
            request_timeout: default_request_timeout(),
            conflict: ConflictPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given endpoint and token with default tuning.
    pub fn new(url: impl Into<String>, token: impl Into<Token>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Build a config from `LOGDB_URL` and `LOGDB_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup(URL_ENV).ok_or_else(|| Error::Config(format!("{URL_ENV} is not set")))?;
        let token =
            lookup(TOKEN_ENV).ok_or_else(|| Error::Config(format!("{TOKEN_ENV} is not set")))?;
        let config = Self::new(url, token);
        config.validate()?;
        Ok(config)
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum events per fetch.
    #[must_use]
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the conflict policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict = policy;
        self
    }

    /// Check that the endpoint and credential are usable.
    pub fn validate(&self) -> Result<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(Error::Config("url must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "url must start with http:// or https://, got {url}"
            )));
        }
        if self.token.is_empty() {
            return Err(Error::Config("token must not be empty".to_string()));
        }
        if self.batch_limit == 0 {
            return Err(Error::Config("batch_limit must be at least 1".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}
