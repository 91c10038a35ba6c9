//! Prompt builders for each pipeline stage.
//!
//! History is embedded as JSON so the engine sees the same timestamps and
//! ordering the store holds.

use medtriage_core::event::{Event, format_timestamp};
use medtriage_core::store::HistoryEntry;
use serde_json::json;

const RULE: &str = "-----------------------------";

/// Extraction stage: translate and normalize the raw complaint.
pub fn extraction(text: &str) -> String {
    format!(
        "User Text: '{text}'.\n\
         Translate the complaint to English and normalize it.\n\
         Return JSON: {{transcription_en, symptoms:[], specific_suggestion}}."
    )
}

/// Triage stage: reason over the symptom timeline plus the latest complaint.
pub fn triage(history: &[HistoryEntry], latest: &str) -> String {
    let timeline: Vec<_> = history
        .iter()
        .map(|h| json!({"time": format_timestamp(&h.time), "symptom": h.text}))
        .collect();

    format!(
        "Current Patient History (Chronological): {history}\n\
         LATEST Complaint: '{latest}'\n\
         {RULE}\n\
         TASK: Act as a senior medical triage officer. Analyze the TIMELINE of symptoms.\n\
         RULES:\n\
         1. TIMELINE MATTERS: If they had fever yesterday and stomach pain today, connect them \
         (e.g., 'Viral Infection' vs just 'Gas').\n\
         2. PRIORITY CALIBRATION: Be realistic. Knee pain/cough is usually LOW/MEDIUM. \
         Chest pain/Breathing issues are HIGH. Let the severity dictate the priority, do not default to High.\n\
         3. SPECIALIST: Recommend ONE specialist based on the *combined* picture of history + new symptom.\n\
         4. REASON: Explain explicitly referencing the history. \
         (e.g. 'Considering your fever from yesterday and current stomach pain...')\n\
         {RULE}\n\
         Return JSON: {{specialist, reason, priority}} with priority one of low, medium, high.",
        history = serde_json::Value::Array(timeline),
    )
}

/// Image stage: judge the attached image against recent symptoms.
pub fn image(history: &[HistoryEntry], context: &str) -> String {
    let texts: Vec<&str> = history.iter().map(|h| h.text.as_str()).collect();

    format!(
        "Patient Context History: {history}\n\
         Current Complaint: '{context}'.\n\
         Now analyze this uploaded image.\n\
         1. Does the visual evidence confirm or change the diagnosis based on the history?\n\
         2. If the image shows something severe (deep wound, severe rash), increase priority.\n\
         Return JSON: {{specialist, reason, priority, visual_observation}} \
         with priority one of low, medium, high.",
        history = json!(texts),
    )
}

/// Report stage: synthesize a SOAP note over recent events.
pub fn report(events: &[Event]) -> String {
    let events = serde_json::to_string(events).unwrap_or_else(|_| "[]".into());

    format!(
        "Analyze this patient history: {events}.\n\
         Generate a professional Medical SOAP Report in JSON format.\n\
         IMPORTANT: Identify 'Critical Alerts' (e.g., Severe Pain, Surgeries, High Fever, Heart Issues) separately.\n\
         Only list alerts that appear in the history. If the history is empty, say so and leave critical_alerts empty.\n\
         Return strictly JSON with this structure:\n\
         {{\n\
         \x20 \"patient_summary\": \"Short 1-sentence summary\",\n\
         \x20 \"critical_alerts\": [\"Alert 1\", \"Alert 2\"],\n\
         \x20 \"soap\": {{\n\
         \x20   \"subjective\": \"Detailed patient complaints...\",\n\
         \x20   \"objective\": \"Observations based on history...\",\n\
         \x20   \"assessment\": \"Potential diagnosis/analysis...\",\n\
         \x20   \"plan\": \"Recommended next steps...\"\n\
         \x20 }}\n\
         }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtriage_core::event::EventBody;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry::from(&Event::new(1, text, EventBody::HistoryNote))
    }

    #[test]
    fn extraction_quotes_input() {
        let p = extraction("me duele la cabeza");
        assert!(p.contains("User Text: 'me duele la cabeza'"));
        assert!(p.contains("transcription_en"));
    }

    #[test]
    fn triage_lists_history_in_order_before_latest() {
        let p = triage(&[entry("fever"), entry("chills")], "stomach pain");
        let fever = p.find("\"fever\"").unwrap();
        let chills = p.find("\"chills\"").unwrap();
        let latest = p.find("LATEST Complaint: 'stomach pain'").unwrap();
        assert!(fever < chills && chills < latest);
        assert!(p.contains("TIMELINE MATTERS"));
        assert!(p.contains("\"time\""));
    }

    #[test]
    fn triage_with_empty_history() {
        let p = triage(&[], "mild headache");
        assert!(p.contains("Current Patient History (Chronological): []"));
    }

    #[test]
    fn image_prompt_carries_texts_and_context() {
        let p = image(&[entry("itchy arm")], "rash spreading");
        assert!(p.contains("[\"itchy arm\"]"));
        assert!(p.contains("Current Complaint: 'rash spreading'"));
        assert!(p.contains("visual_observation"));
    }

    #[test]
    fn report_prompt_embeds_events() {
        let events = vec![Event::new(1, "appendectomy in 2019", EventBody::HistoryNote)];
        let p = report(&events);
        assert!(p.contains("appendectomy in 2019"));
        assert!(p.contains("\"history_note\""));
        assert!(p.contains("critical_alerts"));
    }

    #[test]
    fn report_prompt_empty_history() {
        assert!(report(&[]).contains("Analyze this patient history: []."));
    }
}
