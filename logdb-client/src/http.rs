//! HTTP transport for the LogDB service.
//!
//! Every request carries `Authorization: Bearer <token>` and
//! `Content-Type: application/json`. A write, ack or nack is accepted only on
//! a 200 response; other 2xx codes come back as `false` and error statuses as
//! [`Error::Status`]. A 409 on fetch maps to [`Error::Conflict`].

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{EventId, EventRecord, ReceivedEvent};

/// Transport that talks to a LogDB server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
            .map_err(|e| Error::Config(format!("token is not a valid header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// The base endpoint requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a response onto the "accepted iff 200" rule.
    async fn accepted(response: Response) -> Result<bool> {
        let status = response.status();
        if status.is_success() {
            return Ok(status == StatusCode::OK);
        }
        Err(Self::status_error(response).await)
    }

    async fn status_error(response: Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::Status { status, body }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn write_events(&self, events: &[EventRecord]) -> Result<bool> {
        let response = self
            .client
            .post(self.endpoint("/events"))
            .json(events)
            .send()
            .await?;
        Self::accepted(response).await
    }

    async fn fetch_events(&self, limit: usize) -> Result<Vec<ReceivedEvent>> {
        let response = self
            .client
            .get(self.endpoint(&format!("/events/{limit}")))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            debug!(limit, "Fetch reported a cursor conflict");
            return Err(Error::Conflict);
        }
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        // An empty body or `null` both mean nothing new.
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let events: Option<Vec<ReceivedEvent>> = serde_json::from_slice(&body)?;
        Ok(events.unwrap_or_default())
    }

    async fn ack(&self, event_id: EventId) -> Result<bool> {
        let response = self
            .client
            .post(self.endpoint(&format!("/ack/{event_id}")))
            .send()
            .await?;
        Self::accepted(response).await
    }

    async fn nack(&self) -> Result<bool> {
        let response = self.client.post(self.endpoint("/nack")).send().await?;
        Self::accepted(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let config = ClientConfig::new("http://localhost:8080/", "token");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080");
        assert_eq!(transport.endpoint("/nack"), "http://localhost:8080/nack");
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = ClientConfig::new("http://localhost:8080", "");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn new_rejects_token_with_newline() {
        let config = ClientConfig::new("http://localhost:8080", "bad\ntoken");
        assert!(matches!(
            HttpTransport::new(&config),
            Err(Error::Config(_))
        ));
    }
}
