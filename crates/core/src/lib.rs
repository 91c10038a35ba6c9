//! # MedTriage Core
//!
//! Domain types, traits, and error definitions for the MedTriage symptom log.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Layout
//!
//! - [`event`]: the patient event log entry and its kind-tagged payload
//! - [`record`]: structured records produced by the reasoning engine
//! - [`store`]: the `EventStore` trait and history windowing
//! - [`provider`]: the `Provider` trait over reasoning-engine backends
//! - [`message`]: prompt messages and image attachments

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod record;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{DecodeError, Error, ProviderError, Result, StoreError};
pub use event::{Event, EventBody, EventId, EventKind};
pub use message::{ImageAttachment, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use record::{Extraction, Priority, SoapNote, SoapReport, TriageResult};
pub use store::{EventStore, HistoryEntry, select_events, select_window};
