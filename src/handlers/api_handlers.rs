//! The `/api/*` gateway surface consumed by the client core.
//!
//! Listing, upload-URL issuance, deletion, folder creation and download
//! redirects. Object bytes never pass through here: uploads and downloads go
//! straight to the signed `/s3/..` endpoints.

use crate::{
    errors::AppError,
    models::{
        listing::{
            CreateFolderRequest, CreateFolderResponse, DeleteResponse, Listing, ObjectRecord,
            UploadUrlResponse, folder_marker_key,
        },
        object::FOLDER_CONTENT_TYPE,
    },
    services::{
        signing::SignedMethod,
        storage_service::{StorageError, StorageService},
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
    response::Redirect,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PrefixQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

impl KeyQuery {
    /// The `key` parameter, rejected with 400 when absent or empty.
    fn required(self) -> Result<String, AppError> {
        match self.key {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(AppError::bad_request("Key is required")),
        }
    }
}

/// `GET /api/objects?prefix=` — one delimiter level with signed read URLs.
pub async fn list_objects(
    State(state): State<AppState>,
    Query(q): Query<PrefixQuery>,
) -> Result<Json<Listing>, AppError> {
    let prefix = q.prefix.unwrap_or_default();
    let level = state.storage.list_level(&state.bucket, &prefix).await?;

    let files = level
        .objects
        .iter()
        .map(|obj| ObjectRecord {
            key: obj.key.clone(),
            size: obj.size(),
            last_modified: obj.last_modified,
            access_url: state
                .signer
                .sign(SignedMethod::Get, &state.bucket, &obj.key, false),
        })
        .collect();

    Ok(Json(Listing {
        files,
        folders: level.common_prefixes,
    }))
}

/// `PUT /api/upload?key=` — signed write URL for `key`.
pub async fn upload_url(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    let key = q.required()?;
    StorageService::validate_key(&key)?;

    let url = state
        .signer
        .sign(SignedMethod::Put, &state.bucket, &key, false);
    Ok(Json(UploadUrlResponse { url }))
}

/// `DELETE /api/delete-file?key=` (also `DELETE /api/objects`).
///
/// Deleting a key that does not exist succeeds, as it does on S3.
pub async fn delete_file(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let key = q.required()?;

    match state.storage.delete_object(&state.bucket, &key).await {
        Ok(_) | Err(StorageError::ObjectNotFound { .. }) => {}
        Err(err) => return Err(err.into()),
    }
    info!(key = %key, "deleted object");

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("File {} deleted successfully", key),
    }))
}

/// `POST /api/folder` — write the zero-byte marker for a new folder.
pub async fn create_folder(
    State(state): State<AppState>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<CreateFolderResponse>, AppError> {
    let folder_name = req.folder_name.trim();
    if folder_name.is_empty() {
        return Err(AppError::bad_request("Folder name is required"));
    }
    if folder_name.contains('/') {
        return Err(AppError::bad_request("Folder name cannot contain '/'"));
    }

    let folder_path = folder_marker_key(&req.parent_path, folder_name);
    state
        .storage
        .put_object_bytes(
            &state.bucket,
            &folder_path,
            Some(FOLDER_CONTENT_TYPE.to_string()),
            Bytes::new(),
        )
        .await?;
    info!(folder = %folder_path, "created folder marker");

    Ok(Json(CreateFolderResponse {
        success: true,
        message: format!("Folder \"{}\" created successfully", folder_name),
        folder_path,
    }))
}

/// `GET /api/download?key=` — redirect to a signed URL that forces
/// `Content-Disposition: attachment`.
pub async fn download(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> Result<Redirect, AppError> {
    let key = q.required()?;
    StorageService::validate_key(&key)?;

    let url = state
        .signer
        .sign(SignedMethod::Get, &state.bucket, &key, true);
    Ok(Redirect::temporary(&url))
}
