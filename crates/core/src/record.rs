//! Structured records produced by the reasoning engine.
//!
//! Each record is what a pipeline stage expects to find in the engine's
//! response once decoded. Fields the engine must supply are required;
//! a response missing them does not decode, so a record never mixes
//! engine output with locally invented values.

use serde::{Deserialize, Deserializer, Serialize};

/// Engines often answer `null` for a field they have nothing to put in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// How urgently the patient should be seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    /// Engines answer in whatever case they like ("LOW", "Moderate", "urgent").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "routine" | "minor" => Ok(Priority::Low),
            "medium" | "moderate" | "mid" => Ok(Priority::Medium),
            "high" | "urgent" | "critical" | "emergency" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The triage recommendation attached to symptom and image events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    /// The single specialist the patient should see
    pub specialist: String,

    /// Why: expected to reference prior history
    pub reason: String,

    pub priority: Priority,

    /// What the engine saw in an uploaded image (image triage only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_observation: Option<String>,
}

impl TriageResult {
    /// The named default used when the triage stage cannot be decoded.
    pub fn fallback() -> Self {
        Self {
            specialist: "General Physician".into(),
            reason: "Standard evaluation".into(),
            priority: Priority::Low,
            visual_observation: None,
        }
    }
}

/// Output of the extraction stage: the normalized complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// The complaint translated to English and normalized
    pub transcription_en: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub symptoms: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub specific_suggestion: String,
}

impl Extraction {
    /// The named default used when the extraction stage cannot be decoded:
    /// the raw input stands in for the transcription.
    pub fn fallback(raw_text: &str) -> Self {
        Self {
            transcription_en: raw_text.to_string(),
            symptoms: Vec::new(),
            specific_suggestion: String::new(),
        }
    }
}

/// A synthesized clinical report over recent history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapReport {
    /// One-sentence summary of the patient
    pub patient_summary: String,

    /// Severe pain, surgeries, high fever, cardiac issues and the like
    #[serde(default, deserialize_with = "null_as_default")]
    pub critical_alerts: Vec<String>,

    pub soap: SoapNote,
}

/// The four-part Subjective/Objective/Assessment/Plan note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoapNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}
