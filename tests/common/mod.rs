//! Shared mock infrastructure for remote storage API tests.
//!
//! Uses wiremock for deterministic HTTP mocking of the drive API and the
//! token endpoint, eliminating network dependencies.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deal_desk::config::GraphConfig;
use deal_desk::graph::{FolderProvisioner, GraphClient};

pub const TENANT: &str = "test-tenant";

/// Drive API mock server plus the client configuration pointing at it.
pub struct GraphApiMock {
    pub server: MockServer,
}

impl GraphApiMock {
    /// Start the mock server and mount the token endpoint.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{TENANT}/oauth2/v2.0/token")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "mock-token",
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Client configuration with both the authority and the API pointed at
    /// the mock server. Rate limits are opened up so tests never throttle.
    pub fn config(&self) -> GraphConfig {
        GraphConfig {
            tenant_id: TENANT.to_string(),
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            authority_base: self.server.uri(),
            api_base: self.server.uri(),
            request_timeout_secs: 5,
            requests_per_second: 200,
            burst_capacity: 500,
        }
    }

    pub fn client(&self) -> GraphClient {
        GraphClient::new(&self.config()).expect("mock client builds")
    }

    pub fn provisioner(&self) -> FolderProvisioner {
        FolderProvisioner::new(Arc::new(self.client()))
    }

    /// Mount a lookup-miss (served once), the expected single creation call,
    /// and the subsequent lookup-hit for one folder path.
    pub async fn mock_create_folder(&self, drive: &str, folder_path: &str, item_id: &str) {
        let url = folder_url(item_id);

        Mock::given(method("GET"))
            .and(path(graph_item_path(drive, folder_path)))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found_body()))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path(graph_children_path(drive, parent_of(folder_path))))
            .and(body_json(create_request_body(last_segment(folder_path))))
            .respond_with(ResponseTemplate::new(201).set_body_json(item_json(
                item_id,
                last_segment(folder_path),
                Some(&url),
            )))
            .expect(1)
            .mount(&self.server)
            .await;

        self.mock_existing_folder(drive, folder_path, item_id).await;
    }

    /// Mount a permanent lookup-hit for one folder path.
    pub async fn mock_existing_folder(&self, drive: &str, folder_path: &str, item_id: &str) {
        let url = folder_url(item_id);
        Mock::given(method("GET"))
            .and(path(graph_item_path(drive, folder_path)))
            .respond_with(ResponseTemplate::new(200).set_body_json(item_json(
                item_id,
                last_segment(folder_path),
                Some(&url),
            )))
            .mount(&self.server)
            .await;
    }
}

/// Encoded request path for a by-path item lookup.
pub fn graph_item_path(drive: &str, folder_path: &str) -> String {
    format!("/drives/{}/root:/{}", drive, encode(folder_path))
}

/// Encoded request path for a children-creation call.
pub fn graph_children_path(drive: &str, parent_path: &str) -> String {
    if parent_path.is_empty() {
        format!("/drives/{drive}/root/children")
    } else {
        format!("/drives/{}/root:/{}:/children", drive, encode(parent_path))
    }
}

/// Request path for a by-id item fetch.
pub fn graph_by_id_path(drive: &str, item_id: &str) -> String {
    format!("/drives/{drive}/items/{item_id}")
}

pub fn item_json(id: &str, name: &str, web_url: Option<&str>) -> Value {
    let mut body = json!({ "id": id, "name": name });
    if let Some(url) = web_url {
        body["webUrl"] = json!(url);
    }
    body
}

pub fn create_request_body(name: &str) -> Value {
    json!({
        "name": name,
        "folder": {},
        "@microsoft.graph.conflictBehavior": "fail",
    })
}

pub fn not_found_body() -> Value {
    json!({ "error": { "code": "itemNotFound", "message": "The resource could not be found." } })
}

pub fn conflict_body() -> Value {
    json!({ "error": { "code": "nameAlreadyExists", "message": "An item with the same name already exists." } })
}

pub fn folder_url(item_id: &str) -> String {
    format!("https://contoso.sharepoint.test/folders/{item_id}")
}

pub fn parent_of(folder_path: &str) -> &str {
    folder_path.rfind('/').map(|i| &folder_path[..i]).unwrap_or("")
}

pub fn last_segment(folder_path: &str) -> &str {
    folder_path.rsplit('/').next().unwrap_or(folder_path)
}

/// Spaces are the only non-URL code points the test folder names use.
fn encode(folder_path: &str) -> String {
    folder_path.replace(' ', "%20")
}
