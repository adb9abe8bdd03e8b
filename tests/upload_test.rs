use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use pad_image_upload::config::{StorageConfig, UploadConfig};
use pad_image_upload::services::storage::LocalStorageService;
use pad_image_upload::{AppState, create_app};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

fn test_state(dir: &Path, max_file_size: u64, file_types: &[&str]) -> AppState {
    let config = UploadConfig {
        allowed_file_types: file_types.iter().map(|s| s.to_string()).collect(),
        max_file_size,
        storage: StorageConfig {
            backend: "local".to_string(),
            base_folder: dir.to_path_buf(),
            public_url: "/uploads".to_string(),
            ..StorageConfig::default()
        },
    };

    AppState {
        storage: Arc::new(LocalStorageService::new(dir, "/uploads")),
        config,
    }
}

fn multipart_body(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "---------------------------123456789012345678901234567";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

async fn post_upload(
    app: axum::Router,
    pad_id: &str,
    content_type: &str,
    body: Vec<u8>,
) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/p/{pad_id}/upload"))
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

/// All regular files under a directory, recursively.
fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        if let Ok(entries) = std::fs::read_dir(&d) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }
    }
    files
}

#[tokio::test]
async fn test_accepted_upload_stored_under_pad_scoped_key() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png", "jpg"]));

    let content = vec![42u8; 10 * 1024];
    let (content_type, body) = multipart_body("diagram.png", &content);
    let (status, json) = post_upload(app, "pad1", &content_type, body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["size"].as_u64(), Some(10 * 1024));
    assert_eq!(json["pad_id"].as_str(), Some("pad1"));

    let location = json["location"].as_str().unwrap();
    assert!(location.starts_with("/uploads/pad1/"));
    assert!(location.ends_with(".png"));

    let key = json["key"].as_str().unwrap();
    assert!(key.starts_with("pad1/"));
    let stored = dir.path().join(key);
    assert_eq!(std::fs::read(&stored).unwrap(), content);

    // Finalized atomically: no .part leftovers.
    assert!(
        files_under(dir.path())
            .iter()
            .all(|p| p.extension().is_none_or(|e| e != "part"))
    );
}

#[tokio::test]
async fn test_rejected_extension_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png", "jpg"]));

    let (content_type, body) = multipart_body("payload.exe", b"MZ fake executable");
    let (status, json) = post_upload(app, "pad1", &content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"].as_str(), Some("extension_rejected"));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_oversized_stream_rejected_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    // 1 MB ceiling, 3 MB body: the ceiling trips while streaming.
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png"]));

    let content = vec![0u8; 3 * 1024 * 1024];
    let (content_type, body) = multipart_body("huge.png", &content);
    let (status, json) = post_upload(app, "pad1", &content_type, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["kind"].as_str(), Some("size_rejected"));
    // No artifact and no partial file left behind.
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_exact_ceiling_size_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 4096, &["png"]));

    let content = vec![7u8; 4096];
    let (content_type, body) = multipart_body("edge.png", &content);
    let (status, json) = post_upload(app, "pad1", &content_type, body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["size"].as_u64(), Some(4096));
}

#[tokio::test]
async fn test_missing_file_part_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png"]));

    let boundary = "---------------------------123456789012345678901234567";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
         not a file\r\n\
         --{boundary}--\r\n"
    );
    let (status, json) = post_upload(
        app,
        "pad1",
        &format!("multipart/form-data; boundary={boundary}"),
        body.into_bytes(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"].as_str(), Some("malformed_upload"));
}

#[tokio::test]
async fn test_truncated_multipart_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png"]));

    let boundary = "---------------------------123456789012345678901234567";
    // File part starts but the body ends without a terminating boundary.
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         some bytes that never finish"
    );
    let (status, json) = post_upload(
        app,
        "pad1",
        &format!("multipart/form-data; boundary={boundary}"),
        body.into_bytes(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"].as_str(), Some("malformed_upload"));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_traversal_pad_id_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png"]));

    let (content_type, body) = multipart_body("a.png", b"data");
    let (status, json) = post_upload(app, "a..b", &content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"].as_str(), Some("bad_request"));
    assert!(files_under(dir.path()).is_empty());
}

#[tokio::test]
async fn test_repeated_uploads_get_distinct_keys() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), 1024 * 1024, &["png"]);

    let (content_type, body) = multipart_body("diagram.png", b"same name, same bytes");
    let (s1, j1) = post_upload(create_app(state.clone()), "pad1", &content_type, body.clone()).await;
    let (s2, j2) = post_upload(create_app(state), "pad1", &content_type, body).await;

    assert_eq!(s1, StatusCode::CREATED);
    assert_eq!(s2, StatusCode::CREATED);
    assert_ne!(j1["key"], j2["key"]);
    assert_eq!(files_under(dir.path()).len(), 2);
}

#[tokio::test]
async fn test_extra_parts_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024 * 1024, &["png"]));

    let boundary = "---------------------------123456789012345678901234567";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
         ignored\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"pic.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         pixels\r\n\
         --{boundary}--\r\n"
    );
    let (status, json) = post_upload(
        app,
        "pad1",
        &format!("multipart/form-data; boundary={boundary}"),
        body.into_bytes(),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["size"].as_u64(), Some(6));
    assert_eq!(files_under(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_settings_endpoint_hides_storage_config() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 2_000_000, &["png", "gif"]));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upload/settings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["max_file_size"].as_u64(), Some(2_000_000));
    assert_eq!(
        json["file_types"],
        serde_json::json!(["png", "gif"])
    );
    // Storage settings must never leak to clients.
    assert!(json.get("storage").is_none());
    assert!(json.get("base_folder").is_none());
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_app(test_state(dir.path(), 1024, &[]));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
