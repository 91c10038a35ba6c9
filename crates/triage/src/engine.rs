//! The reasoning engine as the pipeline sees it:
//! `generate(prompt, optional image) -> text`, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use medtriage_config::AppConfig;
use medtriage_core::error::ProviderError;
use medtriage_core::message::{ImageAttachment, Message};
use medtriage_core::provider::{Provider, ProviderRequest};
use medtriage_providers::router;
use tracing::debug;

/// A provider plus the model settings every stage uses.
#[derive(Clone)]
pub struct ReasoningEngine {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl ReasoningEngine {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build the engine for the configured default provider and model.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let router = router::build_from_config(config);
        let provider = router.default().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "provider '{}' is not registered",
                config.default_provider
            ))
        })?;

        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        Ok(Self::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeout(Duration::from_secs(config.triage.timeout_secs)))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one prompt (and optionally one image) and return the raw reply.
    pub async fn generate(
        &self,
        prompt: String,
        image: Option<ImageAttachment>,
    ) -> Result<String, ProviderError> {
        let mut message = Message::user(prompt);
        if let Some(image) = image {
            message = message.with_image(image);
        }

        let mut request = ProviderRequest::single(&self.model, message);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        debug!(provider = %self.provider.name(), model = %self.model, "Calling reasoning engine");

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| self.timed_out())??;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Engine usage"
            );
        }

        Ok(response.message.content)
    }

    /// Whether the provider answers its health check in time.
    pub async fn health_check(&self) -> Result<bool, ProviderError> {
        tokio::time::timeout(self.timeout, self.provider.health_check())
            .await
            .map_err(|_| self.timed_out())?
    }

    fn timed_out(&self) -> ProviderError {
        ProviderError::Timeout(format!(
            "no response within {}s",
            self.timeout.as_secs_f32()
        ))
    }
}
