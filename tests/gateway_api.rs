//! Gateway API Tests
//!
//! Handler-level tests for the `/api/*` surface and the signed object
//! endpoints.

mod common;

use axum::http::{StatusCode, header};
use axum_test::{TestRequest, TestServer};
use bytes::Bytes;
use common::{BUCKET, split_signed_url, test_state};
use object_drive::{
    models::listing::{CreateFolderResponse, DeleteResponse, Listing, UploadUrlResponse},
    server,
    services::signing::SignedMethod,
    state::AppState,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const PUBLIC_URL: &str = "http://gateway.test";

async fn create_test_server() -> (TempDir, TestServer, AppState) {
    let (dir, state) = test_state(PUBLIC_URL).await;
    let server = TestServer::new(server::app(state.clone())).expect("Failed to create test server");
    (dir, server, state)
}

fn signed(server: &TestServer, method: &str, url: &str) -> TestRequest {
    let (path, params) = split_signed_url(url, PUBLIC_URL);
    let mut request = match method {
        "PUT" => server.put(&path),
        "HEAD" => server.method(axum::http::Method::HEAD, &path),
        _ => server.get(&path),
    };
    for (k, v) in params {
        request = request.add_query_param(&k, v);
    }
    request
}

async fn upload(server: &TestServer, key: &str, body: &'static [u8], content_type: &str) {
    let response = server
        .put("/api/upload")
        .add_query_param("key", key)
        .await;
    response.assert_status_ok();
    let UploadUrlResponse { url } = response.json();

    signed(server, "PUT", &url)
        .content_type(content_type)
        .bytes(Bytes::from_static(body))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_health_endpoints() {
    let (_dir, server, _state) = create_test_server().await;

    server.get("/healthz").await.assert_status_ok();

    let ready = server.get("/readyz").await;
    ready.assert_status_ok();
    let body: Value = ready.json();
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn test_upload_then_list() {
    let (_dir, server, _state) = create_test_server().await;

    upload(&server, "docs/a.txt", b"0123456789", "text/plain").await;
    upload(&server, "docs/sub/b.txt", b"01234567890123456789", "text/plain").await;
    upload(&server, "top.txt", b"x", "text/plain").await;

    let root: Listing = server.get("/api/objects").await.json();
    assert_eq!(root.folders, vec!["docs/"]);
    assert_eq!(root.files.len(), 1);
    assert_eq!(root.files[0].key, "top.txt");

    let docs: Listing = server
        .get("/api/objects")
        .add_query_param("prefix", "docs/")
        .await
        .json();
    assert_eq!(docs.folders, vec!["docs/sub/"]);
    assert_eq!(docs.files.len(), 1);
    assert_eq!(docs.files[0].key, "docs/a.txt");
    assert_eq!(docs.files[0].size, 10);
    assert!(docs.files[0].access_url.starts_with("http://gateway.test/s3/drive/docs/a.txt?"));

    // The listed URL reads the object back.
    let read = signed(&server, "GET", &docs.files[0].access_url).await;
    read.assert_status_ok();
    assert_eq!(read.as_bytes().as_ref(), b"0123456789");
    assert_eq!(read.headers()[header::CONTENT_TYPE], "text/plain");
    assert!(read.headers().get(header::CONTENT_DISPOSITION).is_none());
}

#[tokio::test]
async fn test_listing_wire_format() {
    let (_dir, server, _state) = create_test_server().await;
    upload(&server, "a.txt", b"abc", "text/plain").await;

    let body: Value = server.get("/api/objects").await.json();
    let file = &body["files"][0];
    assert_eq!(file["Key"], "a.txt");
    assert_eq!(file["Size"], 3);
    assert!(file["LastModified"].is_string());
    assert!(file["url"].is_string());
    assert_eq!(body["folders"], json!([]));
}

#[tokio::test]
async fn test_missing_key_is_rejected() {
    let (_dir, server, _state) = create_test_server().await;

    for response in [
        server.put("/api/upload").await,
        server.delete("/api/delete-file").await,
        server.get("/api/download").await,
        server.put("/api/upload").add_query_param("key", "").await,
    ] {
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Key is required");
        assert_eq!(body["status"], 400);
    }

    server
        .put("/api/upload")
        .add_query_param("key", "../escape")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dotted_file_names_are_accepted() {
    let (_dir, server, _state) = create_test_server().await;
    upload(&server, "docs/v1..2.txt", b"v1", "text/plain").await;
    upload(&server, "docs/notes...md", b"notes", "text/markdown").await;

    let docs: Listing = server
        .get("/api/objects")
        .add_query_param("prefix", "docs/")
        .await
        .json();
    let keys: Vec<_> = docs.files.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["docs/notes...md", "docs/v1..2.txt"]);

    let read = signed(&server, "GET", &docs.files[1].access_url).await;
    read.assert_status_ok();
    assert_eq!(read.as_bytes().as_ref(), b"v1");

    server
        .put("/api/upload")
        .add_query_param("key", "docs/../v1.txt")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_put_requires_valid_signature() {
    let (_dir, server, state) = create_test_server().await;

    server
        .put("/s3/drive/docs/a.txt")
        .bytes(Bytes::from_static(b"x"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let url = state.signer.sign(SignedMethod::Put, BUCKET, "docs/a.txt", false);
    let tampered = url.replace("docs/a.txt", "docs/b.txt");
    signed(&server, "PUT", &tampered)
        .bytes(Bytes::from_static(b"x"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // A read URL does not grant writes.
    let read_url = state.signer.sign(SignedMethod::Get, BUCKET, "docs/a.txt", false);
    signed(&server, "PUT", &read_url)
        .bytes(Bytes::from_static(b"x"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let expired = state.signer.sign_until(
        SignedMethod::Put,
        BUCKET,
        "docs/a.txt",
        false,
        chrono::Utc::now().timestamp() - 1,
    );
    signed(&server, "PUT", &expired)
        .bytes(Bytes::from_static(b"x"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let listing: Listing = server
        .get("/api/objects")
        .add_query_param("prefix", "docs/")
        .await
        .json();
    assert!(listing.files.is_empty());
}

#[tokio::test]
async fn test_create_folder() {
    let (_dir, server, _state) = create_test_server().await;

    let response = server
        .post("/api/folder")
        .json(&json!({ "folderName": "2024", "parentPath": "photos" }))
        .await;
    response.assert_status_ok();
    let created: CreateFolderResponse = response.json();
    assert!(created.success);
    assert_eq!(created.folder_path, "photos/2024/");

    let root_level: Value = server
        .post("/api/folder")
        .json(&json!({ "folderName": "music" }))
        .await
        .json();
    assert_eq!(root_level["folderPath"], "music/");

    let root: Listing = server.get("/api/objects").await.json();
    assert_eq!(root.folders, vec!["music/", "photos/"]);

    // An empty folder lists as empty: its marker is not one of its files.
    let empty: Listing = server
        .get("/api/objects")
        .add_query_param("prefix", "photos/2024/")
        .await
        .json();
    assert_eq!(empty, Listing::default());

    server
        .post("/api/folder")
        .json(&json!({ "folderName": "  ", "parentPath": "" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/folder")
        .json(&json!({ "parentPath": "photos/" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_file() {
    let (_dir, server, _state) = create_test_server().await;
    upload(&server, "docs/a.txt", b"abc", "text/plain").await;

    let response = server
        .delete("/api/delete-file")
        .add_query_param("key", "docs/a.txt")
        .await;
    response.assert_status_ok();
    let body: DeleteResponse = response.json();
    assert!(body.success);
    assert_eq!(body.message, "File docs/a.txt deleted successfully");

    let listing: Listing = server
        .get("/api/objects")
        .add_query_param("prefix", "docs/")
        .await
        .json();
    assert!(listing.files.is_empty());

    // Deleting again still succeeds; so does the alias route.
    server
        .delete("/api/objects")
        .add_query_param("key", "docs/a.txt")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_download_redirects_to_attachment() {
    let (_dir, server, _state) = create_test_server().await;
    upload(&server, "reports/q1.pdf", b"%PDF-1.7", "application/pdf").await;

    let response = server
        .get("/api/download")
        .add_query_param("key", "reports/q1.pdf")
        .await;
    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.contains("response-content-disposition=attachment"));

    let download = signed(&server, "GET", &location).await;
    download.assert_status_ok();
    assert_eq!(
        download.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"q1.pdf\""
    );
    assert_eq!(download.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(download.as_bytes().as_ref(), b"%PDF-1.7");

    let head = signed(&server, "HEAD", &location).await;
    head.assert_status_ok();
    assert_eq!(head.headers()[header::CONTENT_TYPE], "application/pdf");
    assert!(head.headers().contains_key(header::ETAG));
}

#[tokio::test]
async fn test_signed_get_of_missing_object_is_not_found() {
    let (_dir, server, state) = create_test_server().await;
    let url = state.signer.sign(SignedMethod::Get, BUCKET, "nope.txt", false);

    signed(&server, "GET", &url)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
