//! End-to-end client behavior against a mocked provider

use anonshare_core::{
    AdvancedConfig, Algorithm, AnonClient, CancellationToken, CustomProvider, Endpoint, Error,
    OverwriteDecision, PixelDrain, PreviewRecord, RequestHandler, ScopedLogger, TransferOptions,
};
use httpmock::prelude::*;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const PREVIEW: &str = include_str!("fixtures/preview.json");
const NOT_FOUND: &str = include_str!("fixtures/not_found.json");
const CONTENT: &[u8] = b"hello world";

fn requests() -> RequestHandler {
    let config = AdvancedConfig {
        max_retries: 1,
        retry_delay: 1,
        max_retry_delay: 1,
        ..AdvancedConfig::default()
    };
    RequestHandler::from_config("anonshare-test/0.1.0", &config, None).unwrap()
}

fn client(server: &MockServer) -> AnonClient<CustomProvider> {
    let endpoint = Endpoint::new("/file", "/file/{}/info", "/file/{}").unwrap();
    let provider = CustomProvider::new(server.url("/api/"), endpoint);
    AnonClient::new(provider, requests(), ScopedLogger::new())
}

async fn mock_preview(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123/info");
            then.status(200)
                .header("content-type", "application/json")
                .body(PREVIEW);
        })
        .await;
}

async fn mock_download(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123");
            then.status(200)
                .header("content-type", "application/octet-stream")
                .body(CONTENT);
        })
        .await;
}

#[tokio::test]
async fn test_preview() {
    let server = MockServer::start_async().await;
    mock_preview(&server).await;

    let preview = client(&server).preview("abc123").await.unwrap();

    assert!(preview.is_success());
    assert_eq!(preview.downloads, Some(1));
    assert_eq!(preview.len(), 24);
    assert_eq!(preview.name.as_deref(), Some("foo.txt"));
}

#[tokio::test]
async fn test_preview_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/missing/info");
            then.status(404).body(NOT_FOUND);
        })
        .await;

    let err = client(&server).preview("missing").await.unwrap_err();
    match err {
        Error::NotFound { target, body } => {
            assert_eq!(target, "missing");
            assert!(body.contains("not_found"));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_preview_server_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123/info");
            then.status(500).body("internal error");
        })
        .await;

    let err = client(&server).preview("abc123").await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 500, .. }));
    assert_eq!(err.response_body(), Some("internal error"));
}

#[tokio::test]
async fn test_preview_malformed_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123/info");
            then.status(200).body("<html>oops</html>");
        })
        .await;

    let err = client(&server).preview("abc123").await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn test_upload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foo.txt");
    std::fs::File::create(&path).unwrap().write_all(CONTENT).unwrap();

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/file")
                .header("user-agent", "anonshare-test/0.1.0")
                .body_contains("filename=\"foo.txt\"")
                .body_contains("hello world");
            then.status(201).body(r#"{"success": true, "id": "abc123"}"#);
        })
        .await;

    let progress = Arc::new(Mutex::new(Vec::new()));
    let seen = progress.clone();
    let options = TransferOptions::new().with_progress(Arc::new(move |p| {
        seen.lock().unwrap().push(p.transferred);
    }));

    let upload = client(&server).upload(&path, &options).await.unwrap();

    assert!(upload.is_success());
    assert_eq!(upload.id.as_deref(), Some("abc123"));
    mock.assert_async().await;
    assert_eq!(progress.lock().unwrap().last(), Some(&(CONTENT.len() as u64)));
}

#[tokio::test]
async fn test_upload_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foo.txt");
    std::fs::write(&path, CONTENT).unwrap();

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/file");
            then.status(413).body(r#"{"success": false, "value": "file_too_large"}"#);
        })
        .await;

    let err = client(&server)
        .upload(&path, &TransferOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(413));
}

#[tokio::test]
async fn test_download() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_preview(&server).await;
    mock_download(&server).await;

    let mut download = client(&server)
        .download("abc123", home.path(), &TransferOptions::new())
        .await
        .unwrap();

    assert!(!download.is_closed());
    assert!(download.len() > 0);
    assert_eq!(download.path(), home.path().join("foo.txt"));
    assert_eq!(download.read_to_vec().unwrap(), CONTENT);
    assert_eq!(
        download.checksum(Algorithm::Sha256).unwrap().to_hex(),
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );

    download.close();
    assert!(download.is_closed());
}

#[tokio::test]
async fn test_download_falls_back_to_identifier() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123/info");
            then.status(200).body(r#"{"success": true, "id": "abc123"}"#);
        })
        .await;
    mock_download(&server).await;

    let download = client(&server)
        .download("abc123", home.path(), &TransferOptions::new())
        .await
        .unwrap();
    assert_eq!(download.path(), home.path().join("abc123"));
}

#[tokio::test]
async fn test_download_not_found() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/missing/info");
            then.status(404).body(NOT_FOUND);
        })
        .await;

    let err = client(&server)
        .download("missing", home.path(), &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_download_leaves_no_partial_file() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    mock_preview(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123");
            then.status(403).body("forbidden");
        })
        .await;

    let err = client(&server)
        .download("abc123", home.path(), &TransferOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(!home.path().join("foo.txt").exists());
    assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_download_keeps_existing_file() {
    let home = TempDir::new().unwrap();
    let existing = home.path().join("foo.txt");
    std::fs::write(&existing, b"precious").unwrap();

    let server = MockServer::start_async().await;
    mock_preview(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123");
            then.status(403).body("forbidden");
        })
        .await;
    let client = client(&server);
    let options = TransferOptions::new();

    let err = client
        .download("abc123", home.path(), &options)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(std::fs::read(&existing).unwrap(), b"precious");

    let err = client
        .download_checked("abc123", home.path(), &options, &OverwriteDecision::Proceed)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(std::fs::read(&existing).unwrap(), b"precious");
    assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_cancelled_download_keeps_existing_file() {
    let home = TempDir::new().unwrap();
    let existing = home.path().join("foo.txt");
    std::fs::write(&existing, b"precious").unwrap();

    let server = MockServer::start_async().await;
    mock_preview(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123");
            then.status(200).body(vec![1u8; 256 * 1024]);
        })
        .await;

    // Cancel as soon as the first chunk lands
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let options = TransferOptions::new()
        .with_cancel(cancel)
        .with_progress(Arc::new(move |_| trigger.cancel()));

    let err = client(&server)
        .download("abc123", home.path(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(std::fs::read(&existing).unwrap(), b"precious");
    assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_download_checked_decisions() {
    let home = TempDir::new().unwrap();
    let existing = home.path().join("foo.txt");
    std::fs::write(&existing, b"old").unwrap();

    let server = MockServer::start_async().await;
    mock_preview(&server).await;
    mock_download(&server).await;
    let client = client(&server);
    let options = TransferOptions::new();

    let skipped = client
        .download_checked("abc123", home.path(), &options, &OverwriteDecision::Skip)
        .await
        .unwrap();
    assert!(skipped.is_none());
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");

    let aborted = client
        .download_checked("abc123", home.path(), &options, &OverwriteDecision::Abort)
        .await;
    assert!(matches!(aborted, Err(Error::Interrupted(_))));
    assert_eq!(std::fs::read(&existing).unwrap(), b"old");

    let replaced = client
        .download_checked("abc123", home.path(), &options, &OverwriteDecision::Proceed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(replaced.read_to_vec().unwrap(), CONTENT);
}

#[tokio::test]
async fn test_logging_toggle_and_unlink() {
    let home = TempDir::new().unwrap();
    let log_file = "test.json";

    let server = MockServer::start_async().await;
    mock_preview(&server).await;

    let mut client = client(&server);
    client
        .logger_mut()
        .set_base_path(home.path())
        .unwrap()
        .add_handler(log_file)
        .unwrap();
    let log_path = home.path().join(log_file);

    // Disabled: instrumented but not persisted
    client.preview("abc123").await.unwrap();
    client.preview("abc123").await.unwrap();
    assert!(log_path.exists());
    assert!(client.logger().call_count() > 0);
    assert!(
        client.logger().get_log_history(log_file).is_empty(),
        "Expected log file to be empty because logging is disabled"
    );

    // Enabled: every operation appends
    client.set_logging(true);
    client.preview("abc123").await.unwrap();
    let first = client.logger().get_log_history(log_file).len();
    assert!(first > 0, "Expected log records because logging is enabled");

    client.preview("abc123").await.unwrap();
    assert!(client.logger().get_log_history(log_file).len() > first);

    client.logger_mut().unlink(log_file).unwrap();
    assert!(!log_path.exists(), "Expected log file to be removed on deletion");
    assert!(client.logger().get_log_history(log_file).is_empty());

    client.shutdown();
}

#[tokio::test]
async fn test_pixeldrain_against_mock() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/gone/info");
            then.status(200).body(NOT_FOUND);
        })
        .await;

    let mut client = AnonClient::new(
        PixelDrain::with_api_url(server.url("/api/")),
        requests(),
        ScopedLogger::new(),
    );
    client.logger_mut().add_memory_handler("memory").unwrap();
    client.set_logging(true);

    let err = client
        .download("gone", home.path(), &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(!client.logger().get_log_history("memory").is_empty());
}

#[tokio::test]
async fn test_null_name_is_counted_and_falls_back_to_identifier() {
    let home = TempDir::new().unwrap();
    let body = r#"{"success": true, "id": "abc123", "name": null, "views": 0}"#;
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/file/abc123/info");
            then.status(200).body(body);
        })
        .await;
    mock_download(&server).await;
    let client = client(&server);

    let preview = client.preview("abc123").await.unwrap();
    assert_eq!(preview, PreviewRecord::from_json(body).unwrap());
    assert_eq!(preview.len(), 4);
    assert_eq!(preview.values_line(), "true,abc123,null,0");

    let download = client
        .download("abc123", home.path(), &TransferOptions::new())
        .await
        .unwrap();
    assert_eq!(download.path(), home.path().join("abc123"));
}
