//! Patient events: the only persisted entity.
//!
//! An event is one immutable, timestamped, identified entry in the patient's
//! history log. Its payload is tagged by kind: symptom and image events carry
//! the triage recommendation made at the time, history notes carry nothing.
//!
//! On disk and over HTTP an event is the flat record
//! `{id, kind, text, timestamp, extra}`, where `extra` is `{"triage": {...}}`
//! for triage-bearing kinds and `{}` for notes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::record::TriageResult;

/// Positive integer identifier, assigned by the store at append time.
pub type EventId = u64;

/// The kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A text complaint, stored in its normalized form
    Symptom,
    /// An uploaded image that was triaged
    ImageAnalysis,
    /// Free-form history supplied by the patient
    HistoryNote,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::Symptom,
        EventKind::ImageAnalysis,
        EventKind::HistoryNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Symptom => "symptom",
            EventKind::ImageAnalysis => "image_analysis",
            EventKind::HistoryNote => "history_note",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event kind '{s}'"))
    }
}

/// Kind-specific payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Symptom { triage: TriageResult },
    ImageAnalysis { triage: TriageResult },
    HistoryNote,
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Symptom { .. } => EventKind::Symptom,
            EventBody::ImageAnalysis { .. } => EventKind::ImageAnalysis,
            EventBody::HistoryNote => EventKind::HistoryNote,
        }
    }

    pub fn triage(&self) -> Option<&TriageResult> {
        match self {
            EventBody::Symptom { triage } | EventBody::ImageAnalysis { triage } => Some(triage),
            EventBody::HistoryNote => None,
        }
    }
}

/// One entry in the patient history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    pub id: EventId,

    /// Canonical human-readable description
    pub text: String,

    /// Creation instant; advisory only, the log is ordered by insertion
    pub timestamp: DateTime<Utc>,

    pub body: EventBody,
}

impl Event {
    /// Create an event stamped with the current UTC time.
    pub fn new(id: EventId, text: impl Into<String>, body: EventBody) -> Self {
        Self {
            id,
            text: text.into(),
            timestamp: Utc::now(),
            body,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    pub fn triage(&self) -> Option<&TriageResult> {
        self.body.triage()
    }

    /// ISO-8601 timestamp with a `Z` suffix, as persisted.
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// --- Wire format ---

#[derive(Serialize, Deserialize)]
struct WireEvent {
    id: EventId,
    kind: EventKind,
    text: String,
    #[serde(with = "iso_z")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    extra: WireExtra,
}

#[derive(Default, Serialize, Deserialize)]
struct WireExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    triage: Option<TriageResult>,
}

impl TryFrom<WireEvent> for Event {
    type Error = String;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        if wire.id == 0 {
            return Err("event id must be positive".into());
        }
        let body = match (wire.kind, wire.extra.triage) {
            (EventKind::Symptom, Some(triage)) => EventBody::Symptom { triage },
            (EventKind::ImageAnalysis, Some(triage)) => EventBody::ImageAnalysis { triage },
            (EventKind::HistoryNote, None) => EventBody::HistoryNote,
            (EventKind::HistoryNote, Some(_)) => {
                return Err(format!("history note {} must not carry a triage", wire.id));
            }
            (kind, None) => {
                return Err(format!("{kind} event {} is missing extra.triage", wire.id));
            }
        };
        Ok(Event {
            id: wire.id,
            text: wire.text,
            timestamp: wire.timestamp,
            body,
        })
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let kind = event.kind();
        let triage = match event.body {
            EventBody::Symptom { triage } | EventBody::ImageAnalysis { triage } => Some(triage),
            EventBody::HistoryNote => None,
        };
        WireEvent {
            id: event.id,
            kind,
            text: event.text,
            timestamp: event.timestamp,
            extra: WireExtra { triage },
        }
    }
}

mod iso_z {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
