//! Shared test helpers for odrive-graph integration tests.
//!
//! Stands up a wiremock OAuth2 token endpoint, drives one authorization-code
//! exchange through it, then swaps the runtime's transport over to a
//! caller-supplied `MockTransport` for the Graph API calls under test.

use std::sync::Arc;

use async_trait::async_trait;
use odrive_core::domain::AuthConfig;
use odrive_core::ports::{UserAgentError, UserAgentHook};
use odrive_graph::mock::MockTransport;
use odrive_graph::runtime::GraphRuntime;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct FixedCodeHook {
    pub code: String,
}

#[async_trait]
impl UserAgentHook for FixedCodeHook {
    async fn obtain_authorization_code(&self, _authorize_url: &str) -> Result<String, UserAgentError> {
        Ok(self.code.clone())
    }
}

/// An authenticated `GraphRuntime` with `mock` installed as its transport.
/// Keeps the backing temp directory and wiremock server alive for the
/// caller's convenience (dropping either is harmless once auth has
/// completed, but holding them avoids surprises in longer tests).
pub struct TestRig {
    pub runtime: GraphRuntime,
    _token_server: MockServer,
    _auth_dir: TempDir,
}

pub async fn authenticated_runtime(mock: Arc<MockTransport>) -> TestRig {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "test-access-token",
            "refresh_token": "test-refresh-token",
            "expires_in": 3600
        })))
        .mount(&token_server)
        .await;

    let auth_dir = tempfile::tempdir().unwrap();
    let config = AuthConfig {
        client_id: "test-client".to_string(),
        code_url: format!("{}/authorize", token_server.uri()),
        token_url: format!("{}/token", token_server.uri()),
        redirect_url: "https://localhost/cb".to_string(),
    };
    let hook: Arc<dyn UserAgentHook> = Arc::new(FixedCodeHook {
        code: "test-code".to_string(),
    });

    let runtime = GraphRuntime::load(&auth_dir.path().join("auth.json"), config, hook.clone()).unwrap();

    let client = reqwest::Client::new();
    runtime.auth().reauth(&client, &hook).await.unwrap();

    runtime.set_transport(mock).await;

    TestRig {
        runtime,
        _token_server: token_server,
        _auth_dir: auth_dir,
    }
}

pub fn item_json(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({ "id": id, "name": name, "size": 10 })
}
