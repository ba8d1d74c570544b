//! Gateway routes.
//!
//! ## Structure
//! - **Health**
//!   - `GET    /healthz`, `GET /readyz`
//!
//! - **File-manager API** (JSON)
//!   - `GET    /api/objects?prefix=` — one delimiter level, signed read URLs
//!   - `DELETE /api/objects?key=` — delete object
//!   - `PUT    /api/upload?key=` — signed write URL
//!   - `DELETE /api/delete-file?key=` — delete object
//!   - `POST   /api/folder` — create folder marker
//!   - `GET    /api/download?key=` — redirect to signed attachment URL
//!
//! - **Signed object endpoints**
//!   - `PUT    /s3/{bucket}/{*key}` — upload bytes
//!   - `GET    /s3/{bucket}/{*key}` — download bytes
//!   - `HEAD   /s3/{bucket}/{*key}` — metadata only
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        api_handlers::{create_folder, delete_file, download, list_objects, upload_url},
        health_handlers::{healthz, readyz},
        object_handlers::{get_object, head_object, put_object},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the gateway router. Shared state is attached by the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/objects", get(list_objects).delete(delete_file))
        .route("/api/upload", put(upload_url))
        .route("/api/delete-file", delete(delete_file))
        .route("/api/folder", post(create_folder))
        .route("/api/download", get(download))
        .route(
            "/s3/{bucket}/{*key}",
            put(put_object).get(get_object).head(head_object),
        )
        .layer(TraceLayer::new_for_http())
}
