//! In-memory log service for testing.
//!
//! Behaves like a single-consumer LogDB server: writes get increasing ids
//! starting at 1, fetches return events past the acknowledged cursor and acks
//! move that cursor forward. Fetch outcomes can be scripted ahead of time to
//! reproduce conflicts, outages and re-deliveries without a real server.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{EventId, EventRecord, ReceivedEvent};

/// A scripted answer for the next fetch.
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Answer with a 409 conflict.
    Conflict,
    /// Fail as if the service could not be reached.
    Unavailable(String),
    /// Return exactly this batch, bypassing the stored log.
    Batch(Vec<ReceivedEvent>),
}

/// A scripted answer for the next ack.
#[derive(Debug, Clone)]
pub enum AckScript {
    /// Answer with a non-200 success status; the cursor stays put.
    Rejected,
    /// Fail as if the service could not be reached.
    Unavailable(String),
}

#[derive(Default)]
struct LogState {
    events: Vec<ReceivedEvent>,
    acked: EventId,
    script: VecDeque<FetchScript>,
    ack_script: VecDeque<AckScript>,
    rejecting_writes: bool,
    writes: Vec<Vec<EventRecord>>,
    acks: Vec<EventId>,
    fetches: usize,
    nacks: usize,
}

/// In-memory implementation of [`Transport`].
#[derive(Default)]
pub struct InMemoryLog {
    state: Mutex<LogState>,
}

impl InMemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted answer; scripted answers are consumed before the stored log is read.
    pub async fn script(&self, answer: FetchScript) {
        self.state.lock().await.script.push_back(answer);
    }

    /// Queue `count` consecutive conflicts.
    pub async fn script_conflicts(&self, count: usize) {
        let mut state = self.state.lock().await;
        for _ in 0..count {
            state.script.push_back(FetchScript::Conflict);
        }
    }

    /// Queue a scripted answer for the next ack.
    pub async fn script_ack(&self, answer: AckScript) {
        self.state.lock().await.ack_script.push_back(answer);
    }

    /// Make subsequent writes answer `false` (non-200) instead of storing the batch.
    pub async fn reject_writes(&self, rejecting: bool) {
        self.state.lock().await.rejecting_writes = rejecting;
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Check if the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.events.is_empty()
    }

    /// Every batch accepted by `write_events`, in order.
    pub async fn written(&self) -> Vec<Vec<EventRecord>> {
        self.state.lock().await.writes.clone()
    }

    /// Every id passed to `ack`, in order, rejected ones included.
    pub async fn acks(&self) -> Vec<EventId> {
        self.state.lock().await.acks.clone()
    }

    /// Highest acknowledged id.
    pub async fn acked_cursor(&self) -> EventId {
        self.state.lock().await.acked
    }

    /// Number of fetch calls, scripted ones included.
    pub async fn fetch_count(&self) -> usize {
        self.state.lock().await.fetches
    }

    /// Number of nack calls.
    pub async fn nack_count(&self) -> usize {
        self.state.lock().await.nacks
    }
}

#[async_trait]
impl Transport for InMemoryLog {
    async fn write_events(&self, events: &[EventRecord]) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.rejecting_writes {
            return Ok(false);
        }

        let mut next_id = state.events.last().map_or(0, |e| e.id);
        for record in events {
            next_id += 1;
            state.events.push(ReceivedEvent {
                id: next_id,
                event_type: record.event_type.clone(),
                payload: Value::String(record.payload.clone()),
                created_at: record.timestamp,
            });
        }
        state.writes.push(events.to_vec());
        Ok(true)
    }

    async fn fetch_events(&self, limit: usize) -> Result<Vec<ReceivedEvent>> {
        let mut state = self.state.lock().await;
        state.fetches += 1;

        match state.script.pop_front() {
            Some(FetchScript::Conflict) => Err(Error::Conflict),
            Some(FetchScript::Unavailable(reason)) => Err(Error::Unavailable(reason)),
            Some(FetchScript::Batch(batch)) => Ok(batch),
            None => {
                let acked = state.acked;
                Ok(state
                    .events
                    .iter()
                    .filter(|e| e.id > acked)
                    .take(limit)
                    .cloned()
                    .collect())
            }
        }
    }

    async fn ack(&self, event_id: EventId) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.acks.push(event_id);
        match state.ack_script.pop_front() {
            Some(AckScript::Rejected) => Ok(false),
            Some(AckScript::Unavailable(reason)) => Err(Error::Unavailable(reason)),
            None => {
                state.acked = state.acked.max(event_id);
                Ok(true)
            }
        }
    }

    async fn nack(&self) -> Result<bool> {
        self.state.lock().await.nacks += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event_type: &str, payload: &str) -> EventRecord {
        EventRecord::new(event_type, 100, payload)
    }

    #[tokio::test]
    async fn write_assigns_incrementing_ids() {
        let log = InMemoryLog::new();
        log.write_events(&[record("a", "1"), record("b", "2")])
            .await
            .unwrap();
        log.write_events(&[record("c", "3")]).await.unwrap();

        let events = log.fetch_events(10).await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(events[2].event_type, "c");
        assert_eq!(events[2].payload, Value::String("3".to_string()));
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn fetch_respects_limit() {
        let log = InMemoryLog::new();
        for i in 0..10 {
            log.write_events(&[record("t", &i.to_string())])
                .await
                .unwrap();
        }

        let batch = log.fetch_events(3).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.last().map(|e| e.id), Some(3));
    }

    #[tokio::test]
    async fn fetch_continues_after_ack() {
        let log = InMemoryLog::new();
        for i in 0..5 {
            log.write_events(&[record("t", &i.to_string())])
                .await
                .unwrap();
        }

        log.ack(3).await.unwrap();
        let batch = log.fetch_events(10).await.unwrap();
        assert_eq!(batch.first().map(|e| e.id), Some(4));
        assert_eq!(log.acked_cursor().await, 3);
    }

    #[tokio::test]
    async fn ack_never_moves_cursor_backward() {
        let log = InMemoryLog::new();
        log.ack(5).await.unwrap();
        log.ack(2).await.unwrap();

        assert_eq!(log.acked_cursor().await, 5);
        assert_eq!(log.acks().await, vec![5, 2]);
    }

    #[tokio::test]
    async fn scripted_ack_failures_leave_cursor_alone() {
        let log = InMemoryLog::new();
        log.script_ack(AckScript::Rejected).await;
        log.script_ack(AckScript::Unavailable("down".to_string()))
            .await;

        assert!(!log.ack(4).await.unwrap());
        assert!(matches!(log.ack(4).await, Err(Error::Unavailable(_))));
        assert_eq!(log.acked_cursor().await, 0);

        assert!(log.ack(4).await.unwrap());
        assert_eq!(log.acked_cursor().await, 4);
        assert_eq!(log.acks().await, vec![4, 4, 4]);
    }

    #[tokio::test]
    async fn scripted_answers_come_first() {
        let log = InMemoryLog::new();
        log.write_events(&[record("t", "x")]).await.unwrap();
        log.script_conflicts(1).await;
        log.script(FetchScript::Unavailable("down".to_string()))
            .await;

        assert!(matches!(log.fetch_events(10).await, Err(Error::Conflict)));
        assert!(matches!(
            log.fetch_events(10).await,
            Err(Error::Unavailable(_))
        ));
        assert_eq!(log.fetch_events(10).await.unwrap().len(), 1);
        assert_eq!(log.fetch_count().await, 3);
    }

    #[tokio::test]
    async fn rejected_writes_are_not_stored() {
        let log = InMemoryLog::new();
        log.reject_writes(true).await;

        assert!(!log.write_events(&[record("t", "x")]).await.unwrap());
        assert!(log.is_empty().await);
        assert!(log.written().await.is_empty());
    }

    #[tokio::test]
    async fn nack_is_counted() {
        let log = InMemoryLog::new();
        log.nack().await.unwrap();
        log.nack().await.unwrap();
        assert_eq!(log.nack_count().await, 2);
    }
}
