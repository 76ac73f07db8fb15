//! Client for the LogDB append-only event log.
//!
//! Producers write events in batches; consumers poll for new events, run
//! them through registered hooks and acknowledge progress so the server can
//! advance its durable read cursor. Delivery is at-least-once: ids at or
//! behind the local cursor are skipped, which makes re-delivery after a
//! conflict harmless.
//!
//! # Key Types
//!
//! - [`LogDb`] - Facade combining the producer and consumer halves
//! - [`Writer`] - Builds event records and submits batch writes
//! - [`Poller`] - The fetch, dispatch, ack, sleep loop
//! - [`Handlers`] - The `event`, `response` and `fail` hooks
//! - [`Transport`] - Seam to the log service, implemented by
//!   [`HttpTransport`] and [`InMemoryLog`]

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod handlers;
pub mod http;
pub mod memory;
pub mod poller;
pub mod transport;
pub mod types;
pub mod writer;

// Re-exports
pub use client::LogDb;
pub use config::{ClientConfig, ConflictPolicy, Token};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use handlers::{Handler, HandlerError, HandlerResult, Handlers, Hook, UnknownHook};
pub use http::HttpTransport;
pub use memory::{AckScript, FetchScript, InMemoryLog};
pub use poller::{DispatchReport, IterationReport, Poller, PollerConfig};
pub use tokio_util::sync::CancellationToken;
pub use transport::{DEFAULT_FETCH_LIMIT, Transport};
pub use types::{EventContext, EventId, EventRecord, ReceivedEvent};
pub use writer::Writer;
