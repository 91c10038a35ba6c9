//! Structured-text decoding of reasoning-engine responses.
//!
//! Engines are asked for a JSON object but often wrap it in prose or a
//! markdown code fence. Decoding is two-tier:
//!
//! 1. strict parse of the whole response;
//! 2. strict parse of the span from the first `{` to the last `}`.
//!
//! Nothing is ever filled in here. Callers that have a safe default apply
//! it themselves when decoding fails.

use medtriage_core::error::DecodeError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode `raw` into a JSON object.
pub fn decode(raw: &str) -> Result<Map<String, Value>, DecodeError> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(map);
    }

    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(DecodeError::NoDocument);
    };
    if end < start {
        return Err(DecodeError::NoDocument);
    }

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::NoDocument),
        Err(e) => Err(DecodeError::Malformed {
            reason: e.to_string(),
        }),
    }
}

/// Decode `raw` and then fit the object to `T`.
///
/// A document that is found but lacks required fields (or has the wrong
/// types) is a `DecodeError::Shape`, so callers see one failure path
/// whether the text was garbage or merely incomplete.
pub fn decode_as<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let map = decode(raw)?;
    serde_json::from_value(Value::Object(map)).map_err(|e| DecodeError::Shape {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use medtriage_core::record::{Priority, TriageResult};
    use serde_json::json;

    #[test]
    fn strict_document_round_trips() {
        let doc = json!({
            "specialist": "Cardiologist",
            "reason": "Chest pain on exertion",
            "priority": "high",
            "nested": {"list": [1, 2, 3]}
        });
        let decoded = decode(&doc.to_string()).unwrap();
        assert_eq!(Value::Object(decoded), doc);
    }

    #[test]
    fn document_inside_prose_is_extracted() {
        let raw = "Sure! Here is the assessment you asked for:\n\
                   {\"specialist\": \"ENT\", \"reason\": \"Ear pain\", \"priority\": \"low\"}\n\
                   Let me know if you need anything else.";
        let decoded = decode(raw).unwrap();
        assert_eq!(decoded["specialist"], "ENT");
    }

    #[test]
    fn code_fenced_document_is_extracted() {
        let raw = "```json\n{\"transcription_en\": \"headache\", \"symptoms\": [\"headache\"]}\n```";
        let decoded = decode(raw).unwrap();
        assert_eq!(decoded["symptoms"], json!(["headache"]));
    }

    #[test]
    fn span_runs_to_last_closing_brace() {
        let raw = "prefix {\"a\": {\"b\": 1}} suffix";
        let decoded = decode(raw).unwrap();
        assert_eq!(decoded["a"]["b"], 1);
    }

    #[test]
    fn no_braces_is_no_document() {
        assert_eq!(decode("I cannot help with that."), Err(DecodeError::NoDocument));
        assert_eq!(decode(""), Err(DecodeError::NoDocument));
    }

    #[test]
    fn reversed_braces_is_no_document() {
        assert_eq!(decode("} nothing here {"), Err(DecodeError::NoDocument));
    }

    #[test]
    fn unbalanced_span_is_malformed() {
        let err = decode("{\"specialist\": \"ENT\", }").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn two_objects_do_not_merge() {
        // Greedy span covers both objects, which is not one valid document
        let err = decode("{\"a\": 1} and {\"b\": 2}").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn top_level_array_is_not_a_document() {
        assert_eq!(decode("[1, 2, 3]"), Err(DecodeError::NoDocument));
    }

    #[test]
    fn decode_as_fits_record() {
        let t: TriageResult = decode_as(
            "Result: {\"specialist\": \"Dermatologist\", \"reason\": \"Rash\", \"priority\": \"Medium\"}",
        )
        .unwrap();
        assert_eq!(t.priority, Priority::Medium);
        assert!(t.visual_observation.is_none());
    }

    #[test]
    fn decode_as_reports_missing_fields_as_shape() {
        let err = decode_as::<TriageResult>("{\"specialist\": \"ENT\"}").unwrap_err();
        assert!(matches!(err, DecodeError::Shape { .. }));
    }
}
