//! HTTP handlers for submitting, listing and deleting previews.
//! Fetching happens in the background; these handlers only touch storage
//! and the job queue through `PreviewService`.

use crate::{errors::AppError, models::preview::Preview, services::preview_service::PreviewService};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Request body for `POST /previews`. A missing or null `url` is treated as
/// blank; any other non-string value is validated in its JSON text form.
#[derive(Debug, Deserialize)]
pub struct CreatePreviewReq {
    #[serde(default)]
    pub url: Value,
}

impl CreatePreviewReq {
    pub fn url(&self) -> String {
        match &self.url {
            Value::Null => String::new(),
            Value::String(url) => url.clone(),
            other => other.to_string(),
        }
    }
}

/// `POST /previews`: 201 with the pending preview, or 422 `{errors: [...]}`.
pub async fn create_preview(
    State(service): State<PreviewService>,
    Json(payload): Json<CreatePreviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let preview = service.submit(&payload.url()).await?;
    Ok((StatusCode::CREATED, Json(preview)))
}

/// `GET /previews`: newest first.
pub async fn list_previews(
    State(service): State<PreviewService>,
) -> Result<Json<Vec<Preview>>, AppError> {
    Ok(Json(service.list().await?))
}

/// `GET /previews/{id}`
pub async fn get_preview(
    State(service): State<PreviewService>,
    Path(id): Path<String>,
) -> Result<Json<Preview>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(service.get(id).await?))
}

/// `DELETE /previews/{id}`: 204, or 404 when absent.
pub async fn delete_preview(
    State(service): State<PreviewService>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// An id that cannot be a preview is simply not found.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found("Not found"))
}
