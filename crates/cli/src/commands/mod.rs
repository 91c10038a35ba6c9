//! Subcommand implementations.

pub mod delete;
pub mod doctor;
pub mod history;
pub mod note;
pub mod onboard;
pub mod report;
pub mod serve;
pub mod triage;

use medtriage_config::AppConfig;
use medtriage_triage::{ReasoningEngine, TriageService};

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured store and reasoning engine as one pipeline.
pub(crate) async fn open_service(
    config: &AppConfig,
) -> Result<TriageService, Box<dyn std::error::Error>> {
    let store = medtriage_store::open_store(&config.store).await?;
    let engine = ReasoningEngine::from_config(config)?;
    Ok(TriageService::new(store, engine, config.triage.clone()))
}
