//! The triage orchestrator.
//!
//! Each operation reads a history window, prompts the engine one stage at a
//! time, decodes every reply, and only then appends a single event. An
//! engine or store failure anywhere before the append leaves the log
//! untouched.

use std::sync::Arc;

use medtriage_config::TriageConfig;
use medtriage_core::error::{DecodeError, Error, Result};
use medtriage_core::event::{Event, EventBody, EventId, EventKind};
use medtriage_core::message::ImageAttachment;
use medtriage_core::record::{Extraction, SoapReport, TriageResult};
use medtriage_core::store::EventStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decode::decode_as;
use crate::engine::ReasoningEngine;
use crate::prompt;

/// Media types the engines accept inline.
const SUPPORTED_MEDIA_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Result of text-symptom triage.
#[derive(Debug, Clone, Serialize)]
pub struct TextTriage {
    pub extraction: Extraction,
    pub triage: TriageResult,
    #[serde(skip)]
    pub event: Event,
}

/// Result of image-context triage.
#[derive(Debug, Clone, Serialize)]
pub struct ImageTriage {
    pub triage: TriageResult,
    #[serde(skip)]
    pub event: Event,
}

/// An uploaded image as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// Media type declared by the client, if any
    pub content_type: Option<String>,
}

/// Orchestrates the extraction, triage, image, and report stages.
#[derive(Clone)]
pub struct TriageService {
    store: Arc<dyn EventStore>,
    engine: ReasoningEngine,
    config: TriageConfig,
}

impl TriageService {
    pub fn new(store: Arc<dyn EventStore>, engine: ReasoningEngine, config: TriageConfig) -> Self {
        Self {
            store,
            engine,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    // --- Text triage ---

    /// Extract, triage against the symptom timeline, and record a symptom.
    pub async fn process_text(&self, text: &str) -> Result<TextTriage> {
        let text = text.trim();
        if text.chars().count() < self.config.min_text_chars {
            return Err(Error::Validation("Text too short/empty".into()));
        }

        debug!(stage = "extraction", chars = text.chars().count(), "Starting text triage");
        let raw = self.engine.generate(prompt::extraction(text), None).await?;
        let extraction = match decode_as::<Extraction>(&raw).and_then(non_empty_transcription) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(stage = "extraction", error = %e, "Using raw text as transcription");
                Extraction::fallback(text)
            }
        };

        let history = self
            .store
            .window(&[EventKind::Symptom], self.config.symptom_window)
            .await?;
        debug!(stage = "triage", history = history.len(), "Triage against timeline");

        let raw = self
            .engine
            .generate(prompt::triage(&history, &extraction.transcription_en), None)
            .await?;
        let triage = match decode_as::<TriageResult>(&raw) {
            Ok(mut triage) => {
                triage.visual_observation = None;
                triage
            }
            Err(e) => {
                warn!(stage = "triage", error = %e, "Using default triage");
                TriageResult::fallback()
            }
        };

        let event = self
            .store
            .append(
                extraction.transcription_en.clone(),
                EventBody::Symptom {
                    triage: triage.clone(),
                },
            )
            .await?;

        info!(
            id = event.id,
            specialist = %triage.specialist,
            priority = %triage.priority,
            "Symptom triaged"
        );
        Ok(TextTriage {
            extraction,
            triage,
            event,
        })
    }

    // --- Image triage ---

    /// Triage an uploaded image in the light of recent symptoms.
    ///
    /// There is no default here: a reply that does not decode fails the
    /// operation and nothing is recorded.
    pub async fn process_image(&self, upload: ImageUpload, context: &str) -> Result<ImageTriage> {
        let image = validate_image(upload)?;

        let history = self
            .store
            .window(&[EventKind::Symptom], self.config.image_window)
            .await?;
        debug!(
            stage = "image",
            media_type = %image.media_type,
            bytes = image.len(),
            history = history.len(),
            "Starting image triage"
        );

        let raw = self
            .engine
            .generate(prompt::image(&history, context), Some(image))
            .await?;
        let triage = decode_as::<TriageResult>(&raw).and_then(require_observation)?;

        let event = self
            .store
            .append(
                format!("Image uploaded for: {context}"),
                EventBody::ImageAnalysis {
                    triage: triage.clone(),
                },
            )
            .await?;

        info!(
            id = event.id,
            specialist = %triage.specialist,
            priority = %triage.priority,
            "Image triaged"
        );
        Ok(ImageTriage { triage, event })
    }

    // --- Report synthesis ---

    /// Summarize recent events of every kind into a SOAP report. Read-only.
    pub async fn generate_report(&self) -> Result<SoapReport> {
        let events = self.store.recent(self.config.report_window).await?;
        debug!(stage = "report", events = events.len(), "Synthesizing report");

        let raw = self.engine.generate(prompt::report(&events), None).await?;
        let report = decode_as::<SoapReport>(&raw)?;

        info!(alerts = report.critical_alerts.len(), "Report synthesized");
        Ok(report)
    }

    // --- History ---

    /// Record a free-form history note exactly as given.
    pub async fn add_history(&self, text: &str) -> Result<Event> {
        if text.trim().is_empty() {
            return Err(Error::Validation("no text".into()));
        }
        let event = self
            .store
            .append(text.to_string(), EventBody::HistoryNote)
            .await?;
        info!(id = event.id, "History note added");
        Ok(event)
    }

    /// The full log in insertion order.
    pub async fn history(&self) -> Result<Vec<Event>> {
        Ok(self.store.all().await?)
    }

    /// Delete one event; unknown ids are a no-op that returns 0.
    pub async fn delete_event(&self, id: EventId) -> Result<usize> {
        let removed = self.store.delete(id).await?;
        info!(id, removed, "Delete requested");
        Ok(removed)
    }
}

fn non_empty_transcription(extraction: Extraction) -> std::result::Result<Extraction, DecodeError> {
    if extraction.transcription_en.trim().is_empty() {
        return Err(DecodeError::Shape {
            reason: "transcription_en is empty".into(),
        });
    }
    Ok(extraction)
}

fn require_observation(triage: TriageResult) -> std::result::Result<TriageResult, DecodeError> {
    match triage.visual_observation.as_deref().map(str::trim) {
        Some(obs) if !obs.is_empty() => Ok(triage),
        _ => Err(DecodeError::Shape {
            reason: "missing field `visual_observation`".into(),
        }),
    }
}

/// Check the upload and settle its media type.
///
/// A declared type is trusted when it is one the engines accept; otherwise
/// the magic bytes decide.
fn validate_image(upload: ImageUpload) -> Result<ImageAttachment> {
    if upload.bytes.is_empty() {
        return Err(Error::Validation("No image uploaded".into()));
    }

    let declared = upload
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| SUPPORTED_MEDIA_TYPES.contains(&ct.as_str()));

    let media_type = match declared {
        Some(ct) => ct,
        None => ImageAttachment::sniff_media_type(&upload.bytes)
            .map(str::to_string)
            .ok_or_else(|| Error::Image("unrecognized image format".into()))?,
    };

    Ok(ImageAttachment::new(media_type, upload.bytes))
}
