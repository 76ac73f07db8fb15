//! The seam between the client and the log service.

use async_trait::async_trait;

use crate::types::{EventId, EventRecord, ReceivedEvent};

/// Default number of events requested per fetch.
pub const DEFAULT_FETCH_LIMIT: usize = 1000;

/// Operations the log service exposes to a client.
///
/// Boolean results follow the service's acceptance rule: `true` only for a
/// 200 response. Error statuses surface as `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Append a batch of records (`POST /events`).
    async fn write_events(&self, events: &[EventRecord]) -> crate::Result<bool>;

    /// Fetch up to `limit` events past the server-side cursor (`GET /events/{limit}`).
    ///
    /// Returns [`Error::Conflict`](crate::Error::Conflict) when the server
    /// reports a stale or contended cursor.
    async fn fetch_events(&self, limit: usize) -> crate::Result<Vec<ReceivedEvent>>;

    /// Advance the durable cursor up to `event_id` (`POST /ack/{event_id}`).
    async fn ack(&self, event_id: EventId) -> crate::Result<bool>;

    /// Release the server's notion of in-flight reads (`POST /nack`).
    async fn nack(&self) -> crate::Result<bool>;
}
