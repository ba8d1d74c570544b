//! src/services/storage_service.rs
//!
//! StorageService — S3-like object operations backed by SQLite for metadata
//! and local disk for payloads, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{md5(bucket/key)}`.

use crate::models::{bucket::Bucket, object::Object};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    collections::BTreeSet,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug)]
pub struct ListObjectsResult {
    pub objects: Vec<Object>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub key_count: usize,
}

/// One fully-paged delimiter level: direct-child objects and sub-prefixes.
#[derive(Debug, Default)]
pub struct LevelListing {
    pub objects: Vec<Object>,
    pub common_prefixes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("region `{0}` is not supported")]
    UnsupportedRegion(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// StorageService provides the object operations the gateway needs:
/// - upload (streams bytes to disk, upserts metadata)
/// - read (metadata from SQLite, payload from disk)
/// - delimited listing
/// - soft delete with payload removal
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const LIST_PAGE_SIZE: usize = 1000;
const SUPPORTED_REGIONS: [&str; 16] = [
    "local",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
    "ap-northeast-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-2",
    "ap-northeast-3",
    "me-south-1",
];

const OBJECT_COLUMNS: &str = "id, bucket_id, key, filename, content_type, size_bytes, etag, \
     storage_class, last_modified, version_id, is_deleted";

impl StorageService {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Reject keys that could escape the bucket or that S3 would refuse:
    /// empty, longer than 1024 bytes, leading `/`, a `..` segment,
    /// backslashes or control characters. Dots inside a name (`v1..2.txt`)
    /// are fine.
    pub fn validate_key(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// S3 rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - no consecutive dots or dot-hyphen patterns
    /// - not shaped like an IPv4 address
    pub fn validate_bucket_name(name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.trim() != name {
            return Err(invalid("cannot begin or end with whitespace"));
        }
        if name.len() < BUCKET_NAME_MIN_LEN || name.len() > BUCKET_NAME_MAX_LEN {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }
        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }
        Ok(())
    }

    fn validate_region(region: &str) -> StorageResult<()> {
        if SUPPORTED_REGIONS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(region))
        {
            Ok(())
        } else {
            Err(StorageError::UnsupportedRegion(region.to_string()))
        }
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Payload path for a key: two shard directories taken from the first
    /// two digest bytes, then the full digest as file name. Keys never become
    /// path components, so `docs/` and `docs/a.txt` cannot collide on disk.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        let mut path = self.bucket_root(bucket_name);
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> StorageResult<Bucket> {
        Self::validate_bucket_name(bucket)?;
        sqlx::query_as::<Sqlite, Bucket>(
            "SELECT id, name, owner_id, region, created_at, versioning_enabled
             FROM buckets WHERE name = ?",
        )
        .bind(bucket)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::BucketNotFound(bucket.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> StorageResult<Object> {
        sqlx::query_as::<_, Object>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0"
        ))
        .bind(key)
        .bind(bucket.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound {
                bucket: bucket.name.clone(),
                key: key.to_string(),
            },
            other => StorageError::Sqlx(other),
        })
    }

    /// Return the bucket row, creating it (and its directory) when missing.
    pub async fn ensure_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket> {
        match self.fetch_bucket(name).await {
            Ok(bucket) => Ok(bucket),
            Err(StorageError::BucketNotFound(_)) => {
                let bucket = self.create_bucket(name, region).await?;
                info!(bucket = %bucket.name, region = %bucket.region, "created bucket");
                Ok(bucket)
            }
            Err(err) => Err(err),
        }
    }

    async fn create_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket> {
        Self::validate_bucket_name(name)?;
        let region = region.to_lowercase();
        Self::validate_region(&region)?;
        fs::create_dir_all(self.bucket_root(name)).await?;

        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: Uuid::new_v4(),
            region,
            created_at: Utc::now(),
            versioning_enabled: false,
        };

        sqlx::query(
            "INSERT INTO buckets (id, name, owner_id, region, created_at, versioning_enabled)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(bucket.id)
        .bind(&bucket.name)
        .bind(bucket.owner_id)
        .bind(&bucket.region)
        .bind(bucket.created_at)
        .bind(bucket.versioning_enabled)
        .execute(&*self.db)
        .await?;

        Ok(bucket)
    }

    /// Stream-upload an object to disk and upsert its metadata.
    ///
    /// Bytes go to a temp file while size and MD5 are computed, the file is
    /// fsynced and renamed into place, then the row is upserted (overwrite
    /// semantics, clears a previous soft delete). Temp files are removed on
    /// every error path.
    pub async fn upload_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<Object>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::validate_key(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let filename = key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(key)
            .to_string();
        let etag = format!("{:x}", digest.compute());

        let insert_result = sqlx::query_as::<_, Object>(&format!(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, filename, content_type, size_bytes,
                etag, storage_class, last_modified, version_id, is_deleted
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                storage_class = excluded.storage_class,
                last_modified = excluded.last_modified,
                version_id = excluded.version_id,
                is_deleted = 0
            RETURNING {OBJECT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(bucket_rec.id)
        .bind(key)
        .bind(&filename)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind("STANDARD")
        .bind(Utc::now())
        .bind::<Option<String>>(None)
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => {
                debug!(bucket, key, size_bytes, "stored object");
                Ok(obj)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Store an in-memory payload. Used for zero-byte folder markers.
    pub async fn put_object_bytes(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        body: Bytes,
    ) -> StorageResult<Object> {
        let stream = stream::once(async move { Ok::<_, io::Error>(body) });
        self.upload_object_stream(bucket, key, content_type, stream)
            .await
    }

    /// Metadata plus an open file handle ready for streaming out.
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(Object, File)> {
        Self::validate_key(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((object, file))
    }

    pub async fn get_object_metadata(&self, bucket: &str, key: &str) -> StorageResult<Object> {
        Self::validate_key(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        self.fetch_object(&bucket_rec, key).await
    }

    /// One page of a ListObjectsV2-style listing.
    ///
    /// Keys are returned in lexicographic order. The continuation token is
    /// the last key of this page; the next page starts strictly after it.
    pub async fn list_objects_v2(
        &self,
        bucket: &str,
        params: &ListObjectsParams,
    ) -> StorageResult<ListObjectsResult> {
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let max_keys = params.max_keys.clamp(1, LIST_PAGE_SIZE);
        let fetch_limit = max_keys + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE bucket_id = "
        ));
        builder.push_bind(bucket_rec.id);
        builder.push(" AND is_deleted = 0");

        if let Some(prefix) = params.prefix.as_deref().filter(|p| !p.is_empty()) {
            // substr() instead of LIKE: `_` and `%` are legal key characters.
            builder.push(" AND substr(key, 1, ");
            builder.push_bind(prefix.chars().count() as i64);
            builder.push(") = ");
            builder.push_bind(prefix.to_string());
        }

        if let Some(token) = params
            .continuation_token
            .as_ref()
            .or(params.start_after.as_ref())
        {
            builder.push(" AND key > ");
            builder.push_bind(token.clone());
        }

        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<Object> = builder.build_query_as().fetch_all(&*self.db).await?;

        let is_truncated = rows.len() == fetch_limit;
        if is_truncated {
            rows.pop();
        }
        let next_continuation_token = if is_truncated {
            rows.last().map(|last| last.key.clone())
        } else {
            None
        };

        let mut contents = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for obj in rows {
            if let Some(delim) = &params.delimiter {
                if let Some(prefix) =
                    compute_common_prefix(&obj.key, params.prefix.as_deref(), delim)
                {
                    common_prefixes.insert(prefix);
                    continue;
                }
            }
            contents.push(obj);
        }

        let key_count = contents.len() + common_prefixes.len();

        Ok(ListObjectsResult {
            objects: contents,
            common_prefixes: common_prefixes.into_iter().collect(),
            is_truncated,
            next_continuation_token,
            key_count,
        })
    }

    /// Every direct child of `prefix` one `/` level deep, all pages merged.
    ///
    /// The marker object whose key equals `prefix` is the folder itself, not
    /// a child of it, and is left out.
    pub async fn list_level(&self, bucket: &str, prefix: &str) -> StorageResult<LevelListing> {
        let mut params = ListObjectsParams {
            prefix: Some(prefix.to_string()).filter(|p| !p.is_empty()),
            delimiter: Some("/".to_string()),
            continuation_token: None,
            start_after: None,
            max_keys: LIST_PAGE_SIZE,
        };

        let mut objects = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        loop {
            let page = self.list_objects_v2(bucket, &params).await?;
            objects.extend(page.objects.into_iter().filter(|o| o.key != prefix));
            common_prefixes.extend(page.common_prefixes);
            match page.next_continuation_token {
                Some(token) if page.is_truncated => params.continuation_token = Some(token),
                _ => break,
            }
        }

        Ok(LevelListing {
            objects,
            common_prefixes: common_prefixes.into_iter().collect(),
        })
    }

    /// Soft-delete an object and remove its payload.
    ///
    /// Returns ObjectNotFound when there is no live object under `key`.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<Object> {
        Self::validate_key(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;

        let result = sqlx::query(
            "UPDATE objects SET is_deleted = 1 WHERE key = ? AND bucket_id = ? AND is_deleted = 0",
        )
        .bind(key)
        .bind(bucket_rec.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let file_path = self.object_path(&bucket_rec.name, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(&bucket_rec.name);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(object)
    }

    /// Remove empty shard directories up to (not including) the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Synthetic "common prefix" for S3 list semantics.
///
/// Returns Some(prefix) when the key lies below a delimiter after the
/// requested prefix, otherwise None.
fn compute_common_prefix(
    key: &str,
    requested_prefix: Option<&str>,
    delimiter: &str,
) -> Option<String> {
    let requested = requested_prefix.unwrap_or("");
    let after_prefix = key.strip_prefix(requested)?;
    let pos = after_prefix.find(delimiter)?;
    Some(format!(
        "{}{}",
        requested,
        &after_prefix[..pos + delimiter.len()]
    ))
}

/// Names formatted like `1.2.3.4`.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, StorageService) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::connect_in_memory().await.unwrap();
        let service = StorageService::new(Arc::new(pool), temp_dir.path());
        service.ensure_bucket("drive", "local").await.unwrap();
        (temp_dir, service)
    }

    async fn put(service: &StorageService, key: &str, body: &'static [u8]) -> Object {
        service
            .put_object_bytes("drive", key, None, Bytes::from_static(body))
            .await
            .unwrap()
    }

    #[test]
    fn test_validate_key() {
        assert!(StorageService::validate_key("docs/a.txt").is_ok());
        assert!(StorageService::validate_key("docs/").is_ok());
        assert!(StorageService::validate_key("").is_err());
        assert!(StorageService::validate_key("/etc/passwd").is_err());
        assert!(StorageService::validate_key("docs/../x").is_err());
        assert!(StorageService::validate_key("..").is_err());
        assert!(StorageService::validate_key("docs/..").is_err());
        assert!(StorageService::validate_key("docs/v1..2.txt").is_ok());
        assert!(StorageService::validate_key("notes...md").is_ok());
        assert!(StorageService::validate_key("..hidden").is_ok());
        assert!(StorageService::validate_key("a\\b").is_err());
        assert!(StorageService::validate_key(&"k".repeat(1025)).is_err());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(StorageService::validate_bucket_name("drive").is_ok());
        assert!(StorageService::validate_bucket_name("my.drive-01").is_ok());
        assert!(StorageService::validate_bucket_name("ab").is_err());
        assert!(StorageService::validate_bucket_name("Drive").is_err());
        assert!(StorageService::validate_bucket_name("-drive").is_err());
        assert!(StorageService::validate_bucket_name("a..b").is_err());
        assert!(StorageService::validate_bucket_name("192.168.0.1").is_err());
    }

    #[test]
    fn test_compute_common_prefix() {
        assert_eq!(
            compute_common_prefix("photos/2024/a.jpg", Some("photos/"), "/"),
            Some("photos/2024/".to_string())
        );
        assert_eq!(compute_common_prefix("photos/a.jpg", Some("photos/"), "/"), None);
        assert_eq!(
            compute_common_prefix("docs/a.txt", None, "/"),
            Some("docs/".to_string())
        );
        assert_eq!(compute_common_prefix("other/a", Some("photos/"), "/"), None);
    }

    #[tokio::test]
    async fn test_upload_and_read_back() {
        let (_tmp, service) = setup().await;
        let stored = service
            .put_object_bytes(
                "drive",
                "docs/a.txt",
                Some("text/plain".into()),
                Bytes::from_static(b"hello"),
            )
            .await
            .unwrap();

        assert_eq!(stored.size(), 5);
        assert_eq!(stored.filename, "a.txt");
        assert_eq!(stored.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));

        let (meta, mut file) = service.get_object_reader("drive", "docs/a.txt").await.unwrap();
        let mut content = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut file, &mut content)
            .await
            .unwrap();
        assert_eq!(content, b"hello");
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_size() {
        let (_tmp, service) = setup().await;
        put(&service, "a.txt", b"first").await;
        put(&service, "a.txt", b"second!").await;

        let meta = service.get_object_metadata("drive", "a.txt").await.unwrap();
        assert_eq!(meta.size(), 7);
    }

    #[tokio::test]
    async fn test_list_level_groups_prefixes_and_hides_marker() {
        let (_tmp, service) = setup().await;
        put(&service, "photos/", b"").await;
        put(&service, "photos/a.jpg", b"0123456789").await;
        put(&service, "photos/2024/b.jpg", b"01234").await;
        put(&service, "photos/2025/", b"").await;
        put(&service, "photos_backup/c.jpg", b"x").await;

        let level = service.list_level("drive", "photos/").await.unwrap();
        let keys: Vec<_> = level.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/a.jpg"]);
        assert_eq!(level.common_prefixes, vec!["photos/2024/", "photos/2025/"]);

        let root = service.list_level("drive", "").await.unwrap();
        assert!(root.objects.is_empty());
        assert_eq!(root.common_prefixes, vec!["photos/", "photos_backup/"]);
    }

    #[tokio::test]
    async fn test_list_pages_do_not_skip_keys() {
        let (_tmp, service) = setup().await;
        for key in ["a", "b", "c", "d", "e"] {
            put(&service, key, b"1").await;
        }

        let mut params = ListObjectsParams {
            prefix: None,
            delimiter: None,
            continuation_token: None,
            start_after: None,
            max_keys: 2,
        };
        let mut seen = Vec::new();
        loop {
            let page = service.list_objects_v2("drive", &params).await.unwrap();
            seen.extend(page.objects.into_iter().map(|o| o.key));
            if !page.is_truncated {
                break;
            }
            params.continuation_token = page.next_continuation_token;
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_delete_object() {
        let (_tmp, service) = setup().await;
        put(&service, "docs/a.txt", b"abc").await;

        service.delete_object("drive", "docs/a.txt").await.unwrap();

        assert!(matches!(
            service.get_object_metadata("drive", "docs/a.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            service.delete_object("drive", "docs/a.txt").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        let level = service.list_level("drive", "docs/").await.unwrap();
        assert!(level.objects.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let (_tmp, service) = setup().await;
        let first = service.ensure_bucket("drive", "local").await.unwrap();
        let second = service.ensure_bucket("drive", "local").await.unwrap();
        assert_eq!(first.id, second.id);

        assert!(matches!(
            service.ensure_bucket("other", "mars-1").await,
            Err(StorageError::UnsupportedRegion(_))
        ));
    }
}
