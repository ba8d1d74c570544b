//! Wire types of the `/api/*` surface.
//!
//! Field names follow the JSON contract (`Key`, `Size`, `LastModified`, `url`
//! for files; camelCase for request and response bodies).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One object as returned by a delimited listing.
///
/// `access_url` is a signed GET URL that expires (one hour by default). It is
/// a capability, not an identifier: never persist it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Size")]
    pub size: u64,

    #[serde(rename = "LastModified")]
    pub last_modified: DateTime<Utc>,

    #[serde(rename = "url")]
    pub access_url: String,
}

/// A single delimiter level under some prefix: direct-child objects and
/// direct-child common prefixes (each ending in `/`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Listing {
    pub files: Vec<ObjectRecord>,
    pub folders: Vec<String>,
}

impl Listing {
    /// Sum of the direct-child file sizes.
    pub fn files_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadUrlResponse {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub folder_name: String,
    #[serde(default)]
    pub parent_path: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderResponse {
    pub success: bool,
    pub message: String,
    pub folder_path: String,
}

/// Key of the marker object for `folder_name` under `parent_path`.
///
/// An empty parent yields `name/`; otherwise the parent gets a separator if it
/// lacks one.
pub fn folder_marker_key(parent_path: &str, folder_name: &str) -> String {
    if parent_path.is_empty() {
        format!("{}/", folder_name)
    } else if parent_path.ends_with('/') {
        format!("{}{}/", parent_path, folder_name)
    } else {
        format!("{}/{}/", parent_path, folder_name)
    }
}

/// Key an uploaded file lands on: `prefix + file_name`. The prefix must
/// already end in `/` when non-empty.
pub fn upload_key(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}{}", prefix, file_name)
    }
}
