//! The triage pipeline for MedTriage.
//!
//! Every operation follows the same shape:
//!
//! 1. **Window** the event log for the stage's history context
//! 2. **Prompt** the reasoning engine (optionally with an image)
//! 3. **Decode** the reply: strict JSON first, then the outermost `{...}` span
//! 4. **Fall back** to a named default where one is safe (extraction, text
//!    triage) or fail the operation where it is not (image, report)
//! 5. **Append** exactly one event, after everything above has succeeded

pub mod decode;
pub mod engine;
pub mod prompt;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use decode::{decode, decode_as};
pub use engine::ReasoningEngine;
pub use service::{ImageTriage, ImageUpload, TextTriage, TriageService};
