//! Shared setup for gateway integration tests.

#![allow(dead_code)]

use object_drive::{
    config::{AppConfig, ServeArgs},
    db, server,
    state::AppState,
};
use tempfile::TempDir;

pub const BUCKET: &str = "drive";

/// Gateway config rooted in `storage_dir` that signs URLs for `public_url`.
pub fn test_config(storage_dir: &TempDir, public_url: &str) -> AppConfig {
    let args = ServeArgs {
        host: Some("127.0.0.1".into()),
        port: Some(0),
        storage_dir: Some(storage_dir.path().to_string_lossy().into_owned()),
        bucket: Some(BUCKET.into()),
        public_url: Some(public_url.into()),
        signing_secret: Some("test-secret-key-for-testing-only".into()),
        ..Default::default()
    };
    AppConfig::resolve(&args, |_| None).expect("valid test config")
}

/// App state over an in-memory database and a fresh storage directory.
pub async fn test_state(public_url: &str) -> (TempDir, AppState) {
    let storage_dir = TempDir::new().expect("temp dir");
    let cfg = test_config(&storage_dir, public_url);
    let pool = db::connect_in_memory().await.expect("in-memory database");
    let state = server::build_state(&cfg, pool).await.expect("app state");
    (storage_dir, state)
}

/// Split a signed URL into its path (relative to `public_url`) and query pairs.
pub fn split_signed_url(url: &str, public_url: &str) -> (String, Vec<(String, String)>) {
    let relative = url
        .strip_prefix(public_url)
        .unwrap_or_else(|| panic!("{} is not under {}", url, public_url));
    let (path, query) = relative.split_once('?').unwrap_or((relative, ""));
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (path.to_string(), params)
}
