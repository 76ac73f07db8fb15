//! Producer side: turning payloads into event records and writing batches.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::transport::Transport;
use crate::types::EventRecord;

/// Builds event records and submits them as batch writes.
///
/// All methods return `Ok(true)` only when the service accepted the batch
/// with a 200 response. Transport errors propagate unchanged; nothing is
/// retried here.
pub struct Writer<T> {
    transport: Arc<T>,
}

impl<T> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Writer<T> {
    /// Create a writer over a shared transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Write one event stamped with the current time.
    pub async fn emit<P>(&self, event_type: &str, payload: &P) -> Result<bool>
    where
        P: Serialize + ?Sized,
    {
        let record = EventRecord::encode(event_type, now(), payload)?;
        self.write_events(&[record]).await
    }

    /// Write one event per payload, all sharing a single timestamp.
    pub async fn emit_bulk<P>(&self, event_type: &str, payloads: &[P]) -> Result<bool>
    where
        P: Serialize,
    {
        let timestamp = now();
        let records = payloads
            .iter()
            .map(|payload| EventRecord::encode(event_type, timestamp, payload))
            .collect::<Result<Vec<_>>>()?;
        self.write_events(&records).await
    }

    /// Write a caller-built record as-is.
    pub async fn raw_emit(&self, record: EventRecord) -> Result<bool> {
        self.write_events(std::slice::from_ref(&record)).await
    }

    /// Write caller-built records as-is.
    pub async fn raw_emit_bulk(&self, records: Vec<EventRecord>) -> Result<bool> {
        self.write_events(&records).await
    }

    /// Submit a batch to the log.
    pub async fn write_events(&self, records: &[EventRecord]) -> Result<bool> {
        debug!(count = records.len(), "Writing events");
        let accepted = self.transport.write_events(records).await?;
        if !accepted {
            debug!(count = records.len(), "Write was not accepted");
        }
        Ok(accepted)
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}
