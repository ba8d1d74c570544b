//! Client core: talks to a gateway over the `/api/*` contract and builds the
//! file-manager behaviour on top of it.
//!
//! - [`Gateway`] is the seam: [`GatewayClient`] implements it over HTTP,
//!   tests implement it in memory.
//! - [`upload`] orchestrates signed-URL uploads.
//! - [`folder_size`] aggregates folder sizes through an explicit cache.
//! - [`browser`] turns listings into navigable views.
//! - [`session`] ties them together and keeps the cache honest.

pub mod browser;
pub mod folder_size;
pub mod session;
pub mod upload;

use crate::{
    config::ClientConfig,
    models::listing::{
        CreateFolderRequest, CreateFolderResponse, DeleteResponse, Listing, UploadUrlResponse,
    },
};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },
    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Operations the client core needs from an object-store gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// One delimiter level under `prefix` (`""` for the root).
    async fn list(&self, prefix: &str) -> GatewayResult<Listing>;

    /// Signed, time-limited URL that accepts a PUT of `key`'s bytes.
    async fn request_upload_url(&self, key: &str) -> GatewayResult<String>;

    /// PUT `body` to a signed upload URL with the given `Content-Type`.
    async fn put_signed(&self, url: &str, body: Bytes, content_type: &str) -> GatewayResult<()>;

    async fn delete(&self, key: &str) -> GatewayResult<DeleteResponse>;

    async fn create_folder(
        &self,
        folder_name: &str,
        parent_path: &str,
    ) -> GatewayResult<CreateFolderResponse>;

    /// Gateway URL that redirects to an attachment download of `key`.
    fn download_url(&self, key: &str) -> String;
}

/// [`Gateway`] over HTTP with `reqwest`.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        Self::new(&cfg.gateway_url, cfg.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Follow the download redirect and return the object's bytes.
    pub async fn download_bytes(&self, key: &str) -> GatewayResult<Bytes> {
        let operation = format!("download {}", key);
        let response = self
            .client
            .get(self.download_url(key))
            .send()
            .await
            .map_err(|source| transport(&operation, source))?;
        let response = ensure_success(response, &operation).await?;
        response
            .bytes()
            .await
            .map_err(|source| transport(&operation, source))
    }
}

fn transport(operation: &str, source: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        operation: operation.to_string(),
        source,
    }
}

/// Turn a non-2xx response into [`GatewayError::Status`], preferring the
/// gateway's `{"error": ..}` message over the raw body.
async fn ensure_success(response: Response, operation: &str) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                body
            }
        });

    Err(GatewayError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

async fn json_body<T: DeserializeOwned>(response: Response, operation: &str) -> GatewayResult<T> {
    let response = ensure_success(response, operation).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| GatewayError::InvalidResponse(format!("{}: {}", operation, err)))
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn list(&self, prefix: &str) -> GatewayResult<Listing> {
        let operation = format!("list objects under `{}`", prefix);
        let mut request = self.client.get(self.build_url("/api/objects"));
        if !prefix.is_empty() {
            request = request.query(&[("prefix", prefix)]);
        }
        let response = request
            .send()
            .await
            .map_err(|source| transport(&operation, source))?;
        json_body(response, &operation).await
    }

    async fn request_upload_url(&self, key: &str) -> GatewayResult<String> {
        let operation = format!("get upload URL for {}", key);
        debug!(key, "requesting upload url");
        let response = self
            .client
            .put(self.build_url("/api/upload"))
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|source| transport(&operation, source))?;
        let body: UploadUrlResponse = json_body(response, &operation).await?;
        Ok(body.url)
    }

    async fn put_signed(&self, url: &str, body: Bytes, content_type: &str) -> GatewayResult<()> {
        let operation = "upload to signed URL";
        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|source| transport(operation, source))?;
        ensure_success(response, operation).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> GatewayResult<DeleteResponse> {
        let operation = format!("delete {}", key);
        let response = self
            .client
            .delete(self.build_url("/api/delete-file"))
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|source| transport(&operation, source))?;
        json_body(response, &operation).await
    }

    async fn create_folder(
        &self,
        folder_name: &str,
        parent_path: &str,
    ) -> GatewayResult<CreateFolderResponse> {
        let operation = format!("create folder {}", folder_name);
        let response = self
            .client
            .post(self.build_url("/api/folder"))
            .json(&CreateFolderRequest {
                folder_name: folder_name.to_string(),
                parent_path: parent_path.to_string(),
            })
            .send()
            .await
            .map_err(|source| transport(&operation, source))?;
        json_body(response, &operation).await
    }

    fn download_url(&self, key: &str) -> String {
        format!(
            "{}?key={}",
            self.build_url("/api/download"),
            urlencoding::encode(key)
        )
    }
}
