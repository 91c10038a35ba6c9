//! Triage API handlers.
//!
//! Endpoints:
//!
//! - `GET /history` returns the full event log as `{"events": [...]}`
//! - `POST /delete-event` takes `{id}` and returns `{ok, deleted_count}`
//! - `POST /process-text` takes `{text}` and returns `{ok, extraction, triage}`
//! - `POST /process-image` takes multipart `image` + `text_context`, returns `{ok, triage}`
//! - `POST /generate-soap` returns `{ok, soap_data}`
//! - `POST /add-history` takes `{text}` and returns `{ok}`
//!
//! Every failure is `{ok: false, error}` with 400 for bad input and 500 for
//! anything that went wrong on our side or the engine's.

use axum::{
    extract::multipart::{Multipart, MultipartRejection},
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use medtriage_core::error::Error;
use medtriage_core::event::{Event, EventId};
use medtriage_core::record::{SoapReport, TriageResult};
use medtriage_triage::{ImageUpload, TextTriage};

use crate::SharedState;

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

/// A failed request: status code plus the message shown to the caller.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            debug!(status = %self.status, error = %self.message, "Request rejected");
        }
        (
            self.status,
            Json(ErrorResponse {
                ok: false,
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ── Request / response types ─────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: Option<EventId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessTextResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub result: TextTriage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    pub ok: bool,
    pub triage: TriageResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SoapResponse {
    pub ok: bool,
    pub soap_data: SoapReport,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────────

pub(crate) async fn history_handler(
    State(state): State<SharedState>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let events = state.service.history().await?;
    Ok(Json(HistoryResponse { events }))
}

pub(crate) async fn delete_event_handler(
    State(state): State<SharedState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Json(payload) = payload?;
    let id = match payload.id {
        Some(id) if id > 0 => id,
        _ => return Err(ApiError::bad_request("id required")),
    };

    let deleted_count = state.service.delete_event(id).await?;
    Ok(Json(DeleteResponse {
        ok: true,
        deleted_count,
    }))
}

pub(crate) async fn process_text_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<ProcessTextResponse>, ApiError> {
    let Json(payload) = payload?;
    info!(chars = payload.text.chars().count(), "process-text request");

    let result = state.service.process_text(&payload.text).await?;
    Ok(Json(ProcessTextResponse { ok: true, result }))
}

pub(crate) async fn process_image_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessImageResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut upload: Option<ImageUpload> = None;
    let mut context = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                upload = Some(ImageUpload {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            Some("text_context") => {
                context = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
            }
            other => debug!(field = ?other, "Ignoring unknown multipart field"),
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No image uploaded"))?;
    info!(bytes = upload.bytes.len(), "process-image request");

    let result = state.service.process_image(upload, &context).await?;
    Ok(Json(ProcessImageResponse {
        ok: true,
        triage: result.triage,
    }))
}

pub(crate) async fn generate_soap_handler(
    State(state): State<SharedState>,
) -> Result<Json<SoapResponse>, ApiError> {
    let soap_data = state.service.generate_report().await?;
    Ok(Json(SoapResponse {
        ok: true,
        soap_data,
    }))
}

pub(crate) async fn add_history_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(payload) = payload?;
    state.service.add_history(&payload.text).await?;
    Ok(Json(OkResponse { ok: true }))
}
