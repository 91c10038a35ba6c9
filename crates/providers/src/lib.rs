//! Reasoning-engine provider implementations for MedTriage.
//!
//! All providers implement the `medtriage_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;

use base64::Engine as _;
use medtriage_core::message::ImageAttachment;

/// Base64-encode image bytes for JSON request bodies.
pub(crate) fn encode_image(image: &ImageAttachment) -> String {
    base64::engine::general_purpose::STANDARD.encode(&image.data)
}

/// Build a shared HTTP client with the given request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
