//! The `LogDb` facade: one value that both produces and consumes.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::cursor::Cursor;
use crate::handlers::{Handler, HandlerError, HandlerResult, Hook};
use crate::http::HttpTransport;
use crate::poller::{IterationReport, Poller, PollerConfig};
use crate::transport::Transport;
use crate::types::{EventContext, EventId, EventRecord, ReceivedEvent};
use crate::writer::Writer;

/// Client for a LogDB service.
///
/// Producer calls go through the [`Writer`]; `listen` drives the
/// [`Poller`]. Both share one transport.
pub struct LogDb<T = HttpTransport> {
    writer: Writer<T>,
    poller: Poller<T>,
    endpoint: String,
}

impl LogDb<HttpTransport> {
    /// Connect to the service described by `config`.
    ///
    /// No request is made until the first producer or consumer call.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let endpoint = transport.base_url().to_string();
        let mut client = Self::with_transport(Arc::new(transport), PollerConfig::from(config));
        client.endpoint = endpoint;
        Ok(client)
    }

    /// Connect using `LOGDB_URL` and `LOGDB_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::connect(&ClientConfig::from_env()?)
    }
}

impl<T: Transport> LogDb<T> {
    /// Build a client over any transport.
    pub fn with_transport(transport: Arc<T>, config: PollerConfig) -> Self {
        Self {
            writer: Writer::new(Arc::clone(&transport)),
            poller: Poller::new(transport, config),
            endpoint: String::from("(custom transport)"),
        }
    }

    /// Resume consumption after `event_id`, e.g. a cursor saved by the caller.
    ///
    /// Ids at or behind it are treated as already consumed.
    #[must_use]
    pub fn resume_from(mut self, event_id: EventId) -> Self {
        self.poller = self.poller.with_cursor(Cursor::starting_at(event_id));
        self
    }

    /// Register a hook, replacing any previous one with the same name.
    pub fn on(&mut self, handler: Handler) -> &mut Self {
        self.poller.on(handler);
        self
    }

    /// Unregister a hook.
    pub fn off(&mut self, hook: Hook) -> &mut Self {
        self.poller.handlers_mut().remove(hook);
        self
    }

    /// Register the `event` hook.
    pub fn on_event<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on(Handler::event(f))
    }

    /// Register the `response` hook.
    pub fn on_response<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Vec<ReceivedEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(Handler::response(f))
    }

    /// Register the `fail` hook.
    pub fn on_fail<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(HandlerError, EventContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on(Handler::fail(f))
    }

    /// A cloneable producer handle sharing this client's transport.
    #[must_use]
    pub fn writer(&self) -> Writer<T> {
        self.writer.clone()
    }

    /// Write one event stamped with the current time.
    pub async fn emit<P>(&self, event_type: &str, payload: &P) -> Result<bool>
    where
        P: Serialize + ?Sized,
    {
        self.writer.emit(event_type, payload).await
    }

    /// Write one event per payload, all sharing one timestamp.
    pub async fn emit_bulk<P: Serialize>(&self, event_type: &str, payloads: &[P]) -> Result<bool> {
        self.writer.emit_bulk(event_type, payloads).await
    }

    /// Write a caller-built record unchanged.
    pub async fn raw_emit(&self, record: EventRecord) -> Result<bool> {
        self.writer.raw_emit(record).await
    }

    /// Write caller-built records unchanged.
    pub async fn raw_emit_bulk(&self, records: Vec<EventRecord>) -> Result<bool> {
        self.writer.raw_emit_bulk(records).await
    }

    /// Submit a batch of records.
    pub async fn write_events(&self, records: &[EventRecord]) -> Result<bool> {
        self.writer.write_events(records).await
    }

    /// Fetch up to `limit` events, resolving conflicts with nack + refetch.
    pub async fn fetch_events(&self, limit: usize) -> Result<Vec<ReceivedEvent>> {
        self.poller.fetch_events(limit).await
    }

    /// Acknowledge consumption up to `event_id`.
    pub async fn ack(&self, event_id: EventId) -> Result<bool> {
        self.poller.ack(event_id).await
    }

    /// Release this consumer's in-flight reads on the server.
    pub async fn nack(&self) -> Result<bool> {
        self.poller.nack().await
    }

    /// Highest event id consumed so far.
    #[must_use]
    pub fn last_event_id(&self) -> EventId {
        self.poller.last_event_id()
    }

    /// Run a single fetch, dispatch and ack round.
    pub async fn poll_once(&mut self) -> IterationReport {
        self.poller.run_once().await
    }

    /// Consume events forever.
    pub async fn listen(&mut self) {
        self.listen_until(CancellationToken::new()).await;
    }

    /// Consume events until `shutdown` is cancelled. Returns the final cursor.
    pub async fn listen_until(&mut self, shutdown: CancellationToken) -> EventId {
        info!(endpoint = %self.endpoint, "Waiting for events");
        self.poller.run(shutdown).await
    }
}
