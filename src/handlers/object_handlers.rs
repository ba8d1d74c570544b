//! Signed object endpoints under `/s3/{bucket}/{*key}`.
//!
//! These are the targets of the URLs minted by `/api/*`. Every request must
//! carry a valid, unexpired signature for its method; bodies are streamed in
//! both directions.

use crate::{
    errors::AppError,
    models::object::Object,
    services::signing::SignedMethod,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;

/// Query parameters carried by a signed URL. Names match the constants in
/// `services::signing`.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    #[serde(rename = "X-Expires")]
    pub expires: Option<String>,
    #[serde(rename = "X-Signature")]
    pub signature: Option<String>,
    #[serde(rename = "response-content-disposition")]
    pub disposition: Option<String>,
}

impl SignedQuery {
    fn wants_attachment(&self) -> bool {
        self.disposition.as_deref() == Some("attachment")
    }
}

fn authorize(
    state: &AppState,
    method: SignedMethod,
    bucket: &str,
    key: &str,
    q: &SignedQuery,
) -> Result<(), AppError> {
    if bucket != state.bucket {
        return Err(AppError::not_found(format!("bucket `{}` not found", bucket)));
    }
    state.signer.verify(
        method,
        bucket,
        key,
        q.wants_attachment(),
        q.expires.as_deref(),
        q.signature.as_deref(),
    )?;
    Ok(())
}

/// `PUT /s3/{bucket}/{*key}` — store the request body under `key`.
pub async fn put_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    authorize(&state, SignedMethod::Put, &bucket, &key, &q)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let object = state
        .storage
        .upload_object_stream(&bucket, &key, content_type, stream)
        .await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Some(value) = object
        .etag
        .as_ref()
        .and_then(|e| HeaderValue::from_str(&format!("\"{}\"", e)).ok())
    {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `GET /s3/{bucket}/{*key}` — stream the object out.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, AppError> {
    authorize(&state, SignedMethod::Get, &bucket, &key, &q)?;

    let (meta, file) = state.storage.get_object_reader(&bucket, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta, q.wants_attachment());
    Ok(response)
}

/// `HEAD /s3/{bucket}/{*key}` — same headers as GET, no body.
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, AppError> {
    authorize(&state, SignedMethod::Get, &bucket, &key, &q)?;

    let meta = state.storage.get_object_metadata(&bucket, &key).await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta, q.wants_attachment());
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &Object, attachment: bool) {
    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size()));

    if let Some(value) = meta
        .etag
        .as_ref()
        .and_then(|e| HeaderValue::from_str(&format!("\"{}\"", e)).ok())
    {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if attachment {
        let filename = meta.filename.replace('"', "");
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
}
