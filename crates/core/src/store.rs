//! EventStore trait: the durable, append-only patient history log.
//!
//! The store exclusively owns every event. Other components only ever see
//! snapshots (`all`, `window`, `recent`) and mutate through `append` and
//! `delete`.
//!
//! Implementations: JSON file, in-memory (for testing), SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::StoreError;
use crate::event::{Event, EventBody, EventId, EventKind, format_timestamp};

/// One line of prompt context: when it happened and what it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,
    pub text: String,
}

fn serialize_time<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

impl From<&Event> for HistoryEntry {
    fn from(event: &Event) -> Self {
        Self {
            time: event.timestamp,
            text: event.text.clone(),
        }
    }
}

/// Select the last `limit` events whose kind is in `kinds`, oldest first.
///
/// Filtering happens before the tail is taken, so a burst of other kinds
/// never pushes matching events out of the window. An empty `kinds` slice
/// matches every kind.
pub fn select_events<'a>(events: &'a [Event], kinds: &[EventKind], limit: usize) -> Vec<&'a Event> {
    let matching: Vec<&Event> = events
        .iter()
        .filter(|e| kinds.is_empty() || kinds.contains(&e.kind()))
        .collect();
    let skip = matching.len().saturating_sub(limit);
    matching[skip..].to_vec()
}

/// [`select_events`] reduced to prompt context.
pub fn select_window(events: &[Event], kinds: &[EventKind], limit: usize) -> Vec<HistoryEntry> {
    select_events(events, kinds, limit)
        .into_iter()
        .map(HistoryEntry::from)
        .collect()
}

/// The core EventStore trait.
///
/// `append` must be atomic with respect to concurrent callers: computing the
/// next id and persisting the log is one critical section per store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a new event, assigning its id and timestamp.
    async fn append(&self, text: String, body: EventBody) -> Result<Event, StoreError>;

    /// The full log in insertion order.
    async fn all(&self) -> Result<Vec<Event>, StoreError>;

    /// Remove the event with `id`; returns how many were removed (0 or 1).
    async fn delete(&self, id: EventId) -> Result<usize, StoreError>;

    /// Number of events in the log.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.all().await?.len())
    }

    /// The last `limit` events of the given kinds as prompt context.
    async fn window(
        &self,
        kinds: &[EventKind],
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let events = self.all().await?;
        Ok(select_window(&events, kinds, limit))
    }

    /// The last `limit` events of any kind, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let mut events = self.all().await?;
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }
}
