//! The consumption loop.
//!
//! Each iteration walks the same states:
//!
//! ```text
//! FETCHING ──► DISPATCHING ──► ACKNOWLEDGING ──► SLEEPING ──┐
//!    ▲   (409: nack + refetch)                               │
//!    └───────────────────────────────────────────────────────┘
//! ```
//!
//! Fetch failures other than conflicts skip dispatch for that round; the
//! current cursor is still acknowledged. Events are dispatched one at a time
//! in the order the server returned them, and only ids past the cursor reach
//! the `event` hook. The cursor advances to every new id whether or not its
//! hook succeeded, and the ack for a round is only sent once the whole batch
//! has been dispatched.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ClientConfig, ConflictPolicy};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::handlers::{Handler, Handlers};
use crate::transport::{DEFAULT_FETCH_LIMIT, Transport};
use crate::types::{EventContext, EventId, ReceivedEvent};

/// Tuning for the consumption loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Pause between iterations.
    pub poll_interval: Duration,
    /// Maximum events requested per fetch.
    pub batch_limit: usize,
    /// Conflict handling for fetches.
    pub conflict: ConflictPolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_limit: DEFAULT_FETCH_LIMIT,
            conflict: ConflictPolicy::default(),
        }
    }
}

impl From<&ClientConfig> for PollerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            batch_limit: config.batch_limit,
            conflict: config.conflict.clone(),
        }
    }
}

impl PollerConfig {
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

    /// Set the conflict policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict = policy;
        self
    }
}

/// What happened while dispatching one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events in the batch.
    pub received: usize,
    /// Events past the cursor; the cursor moved to each of them.
    pub accepted: usize,
    /// Events at or behind the cursor.
    pub skipped: usize,
    /// Accepted events whose `event` hook failed.
    pub failed: usize,
}

/// What happened during one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationReport {
    /// The fetch errored and dispatch was skipped.
    pub fetch_failed: bool,
    pub dispatch: DispatchReport,
    /// Cursor value that was acknowledged.
    pub cursor: EventId,
    /// The ack was accepted by the server.
    pub acknowledged: bool,
}

/// Polling consumer that owns the cursor and the hook registry.
pub struct Poller<T> {
    transport: Arc<T>,
    handlers: Handlers,
    cursor: Cursor,
    config: PollerConfig,
}

impl<T: Transport> Poller<T> {
    /// Create a poller starting from cursor 0.
    pub fn new(transport: Arc<T>, config: PollerConfig) -> Self {
        Self {
            transport,
            handlers: Handlers::new(),
            cursor: Cursor::new(),
            config,
        }
    }

    /// Resume from `cursor` instead of 0; ids at or behind it are skipped.
    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    /// Register a hook, replacing any previous one with the same name.
    pub fn on(&mut self, handler: Handler) {
        self.handlers.on(handler);
    }

    /// The hook registry.
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// Highest event id consumed so far.
    #[must_use]
    pub fn last_event_id(&self) -> EventId {
        self.cursor.position()
    }

    /// Current loop configuration.
    #[must_use]
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Fetch up to `limit` events, resolving conflicts with nack + refetch.
    ///
    /// Gives up with [`Error::ConflictRetriesExhausted`] once the conflict
    /// policy's retry budget is spent. A failing nack aborts the fetch.
    pub async fn fetch_events(&self, limit: usize) -> Result<Vec<ReceivedEvent>> {
        let policy = &self.config.conflict;
        let mut retries = 0u32;

        loop {
            match self.transport.fetch_events(limit).await {
                Err(Error::Conflict) => {
                    if !policy.allows(retries) {
                        return Err(Error::ConflictRetriesExhausted {
                            attempts: retries + 1,
                        });
                    }
                    retries = retries.saturating_add(1);
                    warn!(attempt = retries, "Fetch conflicted, sending nack");

                    if !self.nack().await? {
                        warn!("Nack was not accepted, refetching anyway");
                    }
                    if !policy.backoff.is_zero() {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
                other => return other,
            }
        }
    }

    /// Acknowledge consumption up to `event_id`.
    pub async fn ack(&self, event_id: EventId) -> Result<bool> {
        debug!(event_id, "Acknowledging");
        self.transport.ack(event_id).await
    }

    /// Ask the server to release this consumer's in-flight reads.
    pub async fn nack(&self) -> Result<bool> {
        debug!("Sending nack");
        self.transport.nack().await
    }

    /// Dispatch one fetched batch through the hooks.
    pub async fn dispatch(&mut self, events: &[ReceivedEvent]) -> DispatchReport {
        let mut report = DispatchReport {
            received: events.len(),
            ..DispatchReport::default()
        };
        if events.is_empty() {
            return report;
        }

        info!(count = events.len(), "Received events");
        self.handlers.notify_response(events).await;

        for event in events {
            if !self.cursor.advance(event.id) {
                trace!(event_id = event.id, cursor = self.cursor.position(), "Skipping already consumed event");
                report.skipped += 1;
                continue;
            }
            report.accepted += 1;

            let ctx = EventContext::from(event);
            if let Some(Err(e)) = self.handlers.handle_event(ctx.clone()).await {
                report.failed += 1;
                warn!(event_id = event.id, error = %e, "Event hook failed");
                self.handlers.notify_fail(e, ctx).await;
            }
        }

        report
    }

    /// Run a single fetch, dispatch and ack round without sleeping.
    pub async fn run_once(&mut self) -> IterationReport {
        let (fetch_failed, dispatch) = match self.fetch_events(self.config.batch_limit).await {
            Ok(events) => (false, self.dispatch(&events).await),
            Err(e) => {
                error!(error = %e, "Fetch failed, skipping dispatch");
                (true, DispatchReport::default())
            }
        };

        let cursor = self.cursor.position();
        let acknowledged = match self.ack(cursor).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(cursor, "Ack was not accepted");
                false
            }
            Err(e) => {
                error!(cursor, error = %e, "Ack failed");
                false
            }
        };

        IterationReport {
            fetch_failed,
            dispatch,
            cursor,
            acknowledged,
        }
    }

    /// Run the loop until `shutdown` is cancelled. Returns the final cursor.
    ///
    /// Cancellation is observed between iterations and during the sleep, so
    /// an in-progress dispatch and its ack always complete.
    pub async fn run(&mut self, shutdown: CancellationToken) -> EventId {
        info!(
            interval = ?self.config.poll_interval,
            cursor = self.cursor.position(),
            "Consumer started"
        );

        while !shutdown.is_cancelled() {
            self.run_once().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(cursor = self.cursor.position(), "Consumer stopped");
        self.cursor.position()
    }
}
