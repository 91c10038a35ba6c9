//! HTTP API gateway for MedTriage.
//!
//! Exposes the triage pipeline and the patient event log over a small JSON
//! API, plus a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use medtriage_config::{AppConfig, GatewayConfig};
use medtriage_triage::{ReasoningEngine, TriageService};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub service: TriageService,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit (`gateway.max_upload_bytes`, covers image uploads)
/// - CORS (any origin unless `gateway.allowed_origins` is set)
/// - HTTP trace logging
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/history", get(api::history_handler))
        .route("/delete-event", post(api::delete_event_handler))
        .route("/process-text", post(api::process_text_handler))
        .route("/process-image", post(api::process_image_handler))
        .route("/generate-soap", post(api::generate_soap_handler))
        .route("/add-history", post(api::add_history_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_upload_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = medtriage_store::open_store(&config.store).await?;
    let engine = ReasoningEngine::from_config(&config)?;
    info!(
        provider = %engine.provider_name(),
        model = %engine.model(),
        store = %store.name(),
        "Triage pipeline ready"
    );

    let state = Arc::new(GatewayState {
        service: TriageService::new(store, engine, config.triage.clone()),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
