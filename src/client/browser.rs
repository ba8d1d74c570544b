//! Navigable views over delimited listings.
//!
//! Directories are never stored: a [`DirectoryView`] is derived from one
//! listing at the moment it is built, and folder sizes come from whatever
//! the [`SizeCache`] already knows.

use super::folder_size::SizeCache;
use crate::models::listing::Listing;
use chrono::{DateTime, Utc};
use serde::Serialize;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

const VIEWABLE_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", //
    // documents
    "pdf", "txt", "md", //
    // video
    "mp4", "webm", "ogg", //
    // audio
    "mp3", "wav", "aac", //
    // web
    "html", "htm", "css", "js", "json", "xml",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub prefix: String,
}

/// Path from the root to `prefix`, one crumb per segment.
pub fn breadcrumbs(prefix: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "Home".into(),
        prefix: String::new(),
    }];
    let mut current = String::new();
    for segment in prefix.split('/').filter(|s| !s.is_empty()) {
        current.push_str(segment);
        current.push('/');
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            prefix: current.clone(),
        });
    }
    crumbs
}

/// Prefix one level up; the root is its own parent.
pub fn parent_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => trimmed[..=pos].to_string(),
        None => String::new(),
    }
}

/// Last segment of an object key.
pub fn file_name(key: &str) -> &str {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => key,
    }
}

/// Last segment of a folder prefix, without the trailing `/`.
pub fn folder_name(prefix: &str) -> &str {
    match prefix.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => prefix,
    }
}

/// Lowercased text after the last `.`; the whole name when there is none.
pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or_default().to_lowercase()
}

/// Whether a file can be previewed inline rather than only downloaded.
pub fn is_viewable(name: &str) -> bool {
    VIEWABLE_EXTENSIONS.contains(&file_extension(name).as_str())
}

/// Human-readable size in powers of 1024, at most two decimals, up to GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub prefix: String,
    /// Known only once the folder's size has been aggregated.
    pub size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Expiring signed read URL.
    pub url: String,
    pub viewable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectoryView {
    pub prefix: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub folders: Vec<FolderEntry>,
    pub files: Vec<FileEntry>,
}

impl DirectoryView {
    pub fn from_listing(prefix: &str, listing: Listing) -> Self {
        let mut folders: Vec<FolderEntry> = listing
            .folders
            .into_iter()
            .map(|folder| FolderEntry {
                name: folder_name(&folder).to_string(),
                prefix: folder,
                size: None,
            })
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));

        let mut files: Vec<FileEntry> = listing
            .files
            .into_iter()
            .filter(|record| record.key != prefix)
            .map(|record| {
                let name = file_name(&record.key).to_string();
                FileEntry {
                    viewable: is_viewable(&name),
                    name,
                    key: record.key,
                    size: record.size,
                    last_modified: record.last_modified,
                    url: record.access_url,
                }
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            prefix: prefix.to_string(),
            breadcrumbs: breadcrumbs(prefix),
            folders,
            files,
        }
    }

    /// Fill folder sizes from the cache where known.
    pub fn with_cached_sizes(mut self, cache: &SizeCache) -> Self {
        for folder in &mut self.folders {
            folder.size = cache.get(&folder.prefix);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }
}
