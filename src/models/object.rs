//! Metadata row for a stored object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Content type written for zero-byte folder markers.
pub const FOLDER_CONTENT_TYPE: &str = "application/x-directory";

/// A stored object. Payload bytes live on disk; this is only the metadata.
///
/// A key ending in `/` is a folder marker: a zero-byte object that keeps an
/// otherwise empty "directory" visible in delimited listings.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    pub id: Uuid,

    pub bucket_id: Uuid,

    /// Full object key, `/`-separated by convention.
    pub key: String,

    /// Last key segment at write time.
    pub filename: String,

    pub content_type: Option<String>,

    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: Option<String>,

    pub storage_class: String,

    pub last_modified: DateTime<Utc>,

    pub version_id: Option<String>,

    /// Soft-delete flag; deleted rows are invisible to every read path.
    pub is_deleted: bool,
}

impl Object {
    pub fn is_folder_marker(&self) -> bool {
        self.key.ends_with('/')
    }

    /// Size as an unsigned byte count. Negative values never come out of the
    /// write path, but the column is signed.
    pub fn size(&self) -> u64 {
        self.size_bytes.max(0) as u64
    }
}
