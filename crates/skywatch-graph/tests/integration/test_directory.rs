//! Integration tests for the drive endpoints behind IRemoteDirectory
//!
//! Covers paged listings, folder creation, download, overwrite upload and
//! status mapping to GraphError.

use std::time::Duration;

use skywatch_core::ports::IRemoteDirectory;
use skywatch_graph::GraphError;
use wiremock::{
    matchers::{body_bytes, body_partial_json, header, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common;

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_root_sends_bearer_and_maps_entries() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {"id": "F-DOCS", "name": "Documents", "folder": {"childCount": 1}},
                {"id": "I-TODO", "name": "todo.txt", "file": {"mimeType": "text/plain"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entries = directory.list("/me/drive/root/children").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "Documents");
    assert_eq!(entries[0].id, "F-DOCS");
    assert_eq!(entries[1].download_ref, "I-TODO");
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/F1/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "A", "name": "a.txt"}],
            "@odata.nextLink": format!("{}/page2?$skiptoken=p2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .and(query_param("$skiptoken", "p2"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "B", "name": "b.txt"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entries = directory.list("/me/drive/items/F1/children").await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_list_empty_folder() {
    let (server, directory) = common::setup_directory().await;
    common::mount_children(&server, "/me/drive/items/EMPTY/children", serde_json::json!([])).await;

    let entries = directory
        .list("/me/drive/items/EMPTY/children")
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_list_not_found_maps_to_graph_error() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/GONE/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "Item does not exist"}
        })))
        .mount(&server)
        .await;

    let err = directory
        .list("/me/drive/items/GONE/children")
        .await
        .unwrap_err();
    match err.downcast_ref::<GraphError>() {
        Some(GraphError::NotFound(body)) => assert!(body.contains("itemNotFound")),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_throttled_listing_carries_retry_after() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "5"))
        .mount(&server)
        .await;

    let err = directory.list("/me/drive/root/children").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::TooManyRequests { retry_after }) if *retry_after == Duration::from_secs(5)
    ));
}

#[tokio::test]
async fn test_expired_token_maps_to_unauthorized() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .respond_with(ResponseTemplate::new(401).set_body_string("InvalidAuthenticationToken"))
        .mount(&server)
        .await;

    let err = directory.list("/me/drive/root/children").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::Unauthorized(_))
    ));
}

// ============================================================================
// Folder creation
// ============================================================================

#[tokio::test]
async fn test_create_folder_returns_new_id() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/items/PARENT/children"))
        .and(body_partial_json(serde_json::json!({
            "name": "Reports",
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "NEW-FOLDER",
            "name": "Reports",
            "folder": {"childCount": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let id = directory.create_folder("PARENT", "Reports").await.unwrap();
    assert_eq!(id, "NEW-FOLDER");
}

#[tokio::test]
async fn test_create_folder_conflict() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("POST"))
        .and(path("/me/drive/items/PARENT/children"))
        .respond_with(ResponseTemplate::new(409).set_body_string("nameAlreadyExists"))
        .mount(&server)
        .await;

    let err = directory
        .create_folder("PARENT", "Reports")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::Conflict(_))
    ));
}

// ============================================================================
// Download / upload
// ============================================================================

#[tokio::test]
async fn test_download_returns_content() {
    let (server, directory) = common::setup_directory().await;
    common::mount_download(&server, "FILE-1", b"someValueSomething").await;

    let data = directory.download("FILE-1").await.unwrap();
    assert_eq!(data, b"someValueSomething");
}

#[tokio::test]
async fn test_download_empty_file() {
    let (server, directory) = common::setup_directory().await;
    common::mount_download(&server, "EMPTY", &[]).await;

    assert!(directory.download("EMPTY").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_replaces_by_name() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/P1:/notes%20file.txt:/content"))
        .and(query_param("@microsoft.graph.conflictBehavior", "replace"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"blabla".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "FILE-2",
            "name": "notes file.txt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    directory
        .upload("P1", "notes file.txt", b"blabla")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_server_error() {
    let (server, directory) = common::setup_directory().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503).set_body_string("serviceNotAvailable"))
        .mount(&server)
        .await;

    let err = directory.upload("P1", "a.txt", b"x").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::ServerError(_))
    ));
}
