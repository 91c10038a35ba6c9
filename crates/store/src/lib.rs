//! Event store implementations for MedTriage.

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileEventStore;
pub use in_memory::InMemoryEventStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventStore;

use std::sync::Arc;

use medtriage_config::{IdPolicy, StoreConfig};
use medtriage_core::error::StoreError;
use medtriage_core::event::{Event, EventId};
use medtriage_core::store::EventStore;

/// Open the backend named in `config.backend`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn EventStore>, StoreError> {
    let store: Arc<dyn EventStore> = match config.backend.as_str() {
        "file" => Arc::new(FileEventStore::open(config.resolved_path(), config.id_policy)?),
        "memory" => Arc::new(InMemoryEventStore::with_policy(config.id_policy)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            Arc::new(SqliteEventStore::open(&config.resolved_path(), config.id_policy).await?)
        }
        other => {
            return Err(StoreError::Storage(format!(
                "store backend '{other}' is not available in this build"
            )));
        }
    };
    tracing::info!(backend = store.name(), "Event store opened");
    Ok(store)
}

/// Pick the id for the next appended event.
///
/// `counter` is the persisted high-water mark used by the monotonic policy;
/// it is ignored under max-plus-one.
pub(crate) fn next_event_id(
    events: &[Event],
    policy: IdPolicy,
    counter: EventId,
) -> Result<EventId, StoreError> {
    let max_plus_one = events
        .iter()
        .map(|e| e.id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(id_space_exhausted)?;
    Ok(match policy {
        IdPolicy::MaxPlusOne => max_plus_one,
        IdPolicy::Monotonic => max_plus_one.max(counter),
    })
}

pub(crate) fn id_space_exhausted() -> StoreError {
    StoreError::Storage("event id space exhausted".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtriage_core::event::EventBody;

    fn note(id: EventId) -> Event {
        Event::new(id, "note", EventBody::HistoryNote)
    }

    #[test]
    fn empty_log_starts_at_one() {
        assert_eq!(next_event_id(&[], IdPolicy::MaxPlusOne, 0).unwrap(), 1);
        assert_eq!(next_event_id(&[], IdPolicy::Monotonic, 0).unwrap(), 1);
    }

    #[test]
    fn max_plus_one_ignores_gaps() {
        let events = vec![note(1), note(7), note(3)];
        assert_eq!(next_event_id(&events, IdPolicy::MaxPlusOne, 42).unwrap(), 8);
    }

    #[test]
    fn largest_id_cannot_be_followed() {
        let events = vec![note(EventId::MAX)];
        for policy in [IdPolicy::MaxPlusOne, IdPolicy::Monotonic] {
            let err = next_event_id(&events, policy, 0).unwrap_err();
            assert!(matches!(err, StoreError::Storage(ref m) if m.contains("exhausted")));
        }
    }

    #[test]
    fn monotonic_honours_counter() {
        let events = vec![note(1), note(2)];
        assert_eq!(next_event_id(&events, IdPolicy::Monotonic, 5).unwrap(), 5);
        assert_eq!(next_event_id(&events, IdPolicy::Monotonic, 0).unwrap(), 3);
    }

    #[tokio::test]
    async fn open_memory_backend() {
        let config = StoreConfig {
            backend: "memory".into(),
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "in_memory");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_file_backend_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: "file".into(),
            path: Some(dir.path().join("data.json")),
            ..StoreConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "file");
    }

    #[tokio::test]
    async fn unknown_backend_is_error() {
        let config = StoreConfig {
            backend: "postgres".into(),
            ..StoreConfig::default()
        };
        assert!(open_store(&config).await.is_err());
    }
}
