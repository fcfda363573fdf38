//! The shared HTTP session: a pooled client, the offline-mode gate, and the
//! seam the mock transport (`mock::MockTransport`) plugs into.

use std::sync::Arc;
use std::time::Duration;

use odrive_core::ports::NetworkFeedbackBus;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::GraphError;

const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const MAX_IDLE_PER_HOST: usize = 20;
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A bare HTTP request, already fully formed (method, absolute URL, headers,
/// optional body). `Transport` implementations send it and return the raw
/// status/body; header assembly and error classification happen a layer up
/// in `executor`.
pub struct RawRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// A raw HTTP response: status code, headers worth inspecting
/// (`Retry-After`), and the body bytes.
pub struct RawResponse {
    pub status: reqwest::StatusCode,
    pub retry_after: Option<String>,
    pub body: Vec<u8>,
}

/// Something that can execute a [`RawRequest`]. Implemented by
/// [`LiveTransport`] and by `mock::MockTransport`.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, GraphError>;

    /// Whether the offline-mode flag should gate this transport. The mock
    /// transport overrides this to `false` so offline-mode tests can drive
    /// it directly (an explicit design choice, not an oversight).
    fn honors_offline_flag(&self) -> bool {
        true
    }
}

/// The default, network-backed transport: a connection-pooled
/// `reqwest::Client`.
pub struct LiveTransport {
    client: Client,
}

impl LiveTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
                .pool_idle_timeout(IDLE_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("building the default reqwest client should never fail"),
        }
    }
}

impl Default for LiveTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for LiveTransport {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, GraphError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(GraphError::from)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(GraphError::from)?.to_vec();

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// The process-wide connection and offline-mode state shared by every
/// in-flight request against one account.
pub struct HttpSession {
    transport: RwLock<Arc<dyn Transport>>,
    offline: RwLock<bool>,
    feedback: NetworkFeedbackBus,
    base_url: String,
}

impl HttpSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: RwLock::new(Arc::new(LiveTransport::new())),
            offline: RwLock::new(false),
            feedback: NetworkFeedbackBus::new(),
            base_url: GRAPH_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn feedback_bus(&self) -> &NetworkFeedbackBus {
        &self.feedback
    }

    /// Swap in a different transport, e.g. `mock::MockTransport` for tests.
    pub async fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write().await = transport;
    }

    pub async fn set_offline(&self, offline: bool) {
        *self.offline.write().await = offline;
        self.feedback.publish(!offline).await;
    }

    pub async fn is_offline(&self) -> bool {
        *self.offline.read().await
    }

    /// Sends `request` through the current transport, short-circuiting with
    /// a network error if operational-offline is set and the current
    /// transport is not exempt from the gate.
    pub async fn send(&self, request: RawRequest) -> Result<RawResponse, GraphError> {
        let transport = self.transport.read().await.clone();

        if *self.offline.read().await && transport.honors_offline_flag() {
            return Err(GraphError::NetworkError(
                "operational offline mode is enabled".to_string(),
            ));
        }

        transport.send(request).await
    }
}

impl Default for HttpSession {
    fn default() -> Self {
        Self::new()
    }
}
