//! Wire and handler-facing event types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Server-assigned event id. Ids increase monotonically across the log.
pub type EventId = u64;

/// A write-side record submitted to `POST /events`.
///
/// `payload` holds the JSON-encoded payload as a string. Extra top-level
/// fields can be attached for callers going through the raw emit path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "evt_type")]
    pub event_type: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub payload: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventRecord {
    /// Create a record from an already-encoded payload.
    pub fn new(event_type: impl Into<String>, timestamp: i64, payload: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp,
            payload: payload.into(),
            extra: Map::new(),
        }
    }

    /// Encode `payload` as JSON and wrap it into a record.
    pub fn encode<P>(event_type: impl Into<String>, timestamp: i64, payload: &P) -> Result<Self>
    where
        P: Serialize + ?Sized,
    {
        Ok(Self::new(
            event_type,
            timestamp,
            serde_json::to_string(payload)?,
        ))
    }

    /// Attach an extra top-level field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A read-side event returned by `GET /events/{limit}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedEvent {
    pub id: EventId,
    #[serde(rename = "evt_type")]
    pub event_type: String,
    /// Opaque payload, usually the JSON-encoded string that was written.
    #[serde(default)]
    pub payload: Value,
    /// Unix seconds at which the event was written.
    #[serde(rename = "timestamp", default)]
    pub created_at: i64,
}

/// The view of a received event handed to the `event` and `fail` hooks.
///
/// Handlers own their copy; flipping `processed` has no effect on the
/// consumer's own bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContext {
    pub id: EventId,
    pub event_type: String,
    pub payload: Value,
    pub created_at: i64,
    pub processed: bool,
}

impl EventContext {
    /// Decode the payload into `T`.
    ///
    /// String payloads are first parsed as JSON text (the form the writer
    /// produces); anything else is decoded as an inline JSON value.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.payload {
            Value::String(encoded) => match serde_json::from_str(encoded) {
                Ok(value) => Ok(value),
                Err(e) => serde_json::from_value(self.payload.clone()).map_err(|_| e.into()),
            },
            inline => Ok(serde_json::from_value(inline.clone())?),
        }
    }

    /// `created_at` as a UTC timestamp, if it is in range.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }
}

impl From<&ReceivedEvent> for EventContext {
    fn from(event: &ReceivedEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            created_at: event.created_at,
            processed: false,
        }
    }
}
