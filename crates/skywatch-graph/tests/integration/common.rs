//! Shared test helpers for Graph API integration tests
//!
//! Provides wiremock-based mock server setup for the drive endpoints and
//! the OAuth token endpoint.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skywatch_graph::auth::OAuth2Config;
use skywatch_graph::client::GraphClient;
use skywatch_graph::provider::GraphDirectory;

pub const TEST_TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a directory adapter pointing at it
pub async fn setup_directory() -> (MockServer, GraphDirectory) {
    let server = MockServer::start().await;
    let directory = GraphDirectory::new(GraphClient::with_base_url(TEST_TOKEN, server.uri()));
    (server, directory)
}

/// OAuth configuration whose authority is the mock server
pub fn oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config::new("test-app-id").with_authority(server.uri())
}

/// Mounts a token endpoint answering with the given JSON body
pub async fn mount_token(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a single-page children listing
pub async fn mount_children(server: &MockServer, endpoint: &str, items: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": items
        })))
        .mount(server)
        .await;
}

/// Mounts a file download endpoint for a specific item ID
pub async fn mount_download(server: &MockServer, item_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/me/drive/items/{item_id}/content")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}
