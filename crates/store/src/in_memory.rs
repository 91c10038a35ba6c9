//! In-memory event store: useful for testing and throwaway sessions.

use async_trait::async_trait;
use medtriage_config::IdPolicy;
use medtriage_core::error::StoreError;
use medtriage_core::event::{Event, EventBody, EventId};
use medtriage_core::store::EventStore;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::next_event_id;

#[derive(Default)]
struct State {
    events: Vec<Event>,
    counter: EventId,
}

/// An event store that keeps the log in a Vec and never touches disk.
pub struct InMemoryEventStore {
    policy: IdPolicy,
    state: Arc<RwLock<State>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_policy(IdPolicy::default())
    }

    pub fn with_policy(policy: IdPolicy) -> Self {
        Self {
            policy,
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, text: String, body: EventBody) -> Result<Event, StoreError> {
        let mut state = self.state.write().await;
        let id = next_event_id(&state.events, self.policy, state.counter)?;
        let event = Event::new(id, text, body);
        state.events.push(event.clone());
        state.counter = id.saturating_add(1);
        Ok(event)
    }

    async fn all(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.state.read().await.events.clone())
    }

    async fn delete(&self, id: EventId) -> Result<usize, StoreError> {
        let mut state = self.state.write().await;
        let before = state.events.len();
        state.events.retain(|e| e.id != id);
        Ok(before - state.events.len())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.read().await.events.len())
    }
}
