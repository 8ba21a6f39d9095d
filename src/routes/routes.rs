//! Defines routes for the preview API.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz` liveness
//!   - `GET    /readyz`  readiness (SQLite)
//!
//! - **Previews**
//!   - `GET    /previews`        list, newest first
//!   - `POST   /previews`        submit `{url}`
//!   - `GET    /previews/events` live updates (SSE)
//!   - `GET    /previews/{id}`   fetch one
//!   - `DELETE /previews/{id}`   delete

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        preview_handlers::{create_preview, delete_preview, get_preview, list_previews},
        stream_handlers::stream_events,
    },
    services::preview_service::PreviewService,
};
use axum::{Router, routing::get};

/// Build the router; handlers share `PreviewService` as state.
pub fn routes() -> Router<PreviewService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/previews", get(list_previews).post(create_preview))
        .route("/previews/events", get(stream_events))
        .route("/previews/{id}", get(get_preview).delete(delete_preview))
}
