//! An HTTP-layer simulator standing in for [`crate::transport::Transport`]
//! in tests: programmable responses, fault injection, pagination
//! synthesis, and a call recorder.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use percent_encoding::percent_decode_str;
use rand::Rng;
use serde_json::Value;

use crate::hash::quick_xor_base64;
use crate::transport::{RawRequest, RawResponse, Transport};
use crate::GraphError;

/// A single recorded inbound request, queryable post-hoc by the test that
/// owns this mock.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: String,
    pub path: String,
    pub body: Option<Vec<u8>>,
    pub time: Instant,
}

#[derive(Clone)]
struct MockResponseSpec {
    status: u16,
    body: Vec<u8>,
    error: Option<String>,
    retry_after: Option<String>,
}

/// Network-condition and behavioral fault-injection knobs.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    pub latency: Duration,
    pub packet_loss_probability: f64,
    pub bandwidth_kbps: Option<u64>,
    pub random_error_rate: f64,
    pub additional_delay: Duration,
    pub throttle_probability: f64,
    pub throttle_delay: Duration,
}

/// The in-process mock HTTP transport.
pub struct MockTransport {
    responses: DashMap<String, MockResponseSpec>,
    /// One-shot overrides consumed on first match, for simulating a
    /// transient failure (e.g. a 401 that clears up after reauth) ahead of
    /// the steady-state response bound in `responses`.
    once_responses: DashMap<String, VecDeque<MockResponseSpec>>,
    /// Drive items keyed by the resource path they're served from, so
    /// content PUTs can find and mutate them.
    items: DashMap<String, Value>,
    /// Full file bodies for ranged-download testing, keyed by their
    /// `/content` resource path. A `Range` header in the request is
    /// honored against these directly, unlike the single canned response
    /// in `responses`.
    ranged_content: DashMap<String, Vec<u8>>,
    calls: Mutex<Vec<MockCall>>,
    fault: Mutex<FaultConfig>,
    base_url: String,
}

const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: DashMap::new(),
            once_responses: DashMap::new(),
            items: DashMap::new(),
            ranged_content: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            fault: Mutex::new(FaultConfig::default()),
            base_url: GRAPH_BASE_URL.to_string(),
        }
    }

    /// Queues a one-shot response for `resource`: the first request served
    /// against it gets this response; subsequent requests fall through to
    /// whatever is bound via `add_mock_response`. Calling this more than
    /// once for the same resource queues further one-shot responses in
    /// order.
    pub fn add_mock_response_once(&self, resource: &str, body: Vec<u8>, status: u16) {
        self.once_responses
            .entry(resource.to_string())
            .or_default()
            .push_back(MockResponseSpec {
                status,
                body,
                error: None,
                retry_after: None,
            });
    }

    /// Queues a one-shot `429` response for `resource` carrying a
    /// `Retry-After: <retry_after_secs>` header, for exercising the retry
    /// engine's rate-limit handling.
    pub fn add_mock_throttle_once(&self, resource: &str, retry_after_secs: u64) {
        self.once_responses
            .entry(resource.to_string())
            .or_default()
            .push_back(MockResponseSpec {
                status: 429,
                body: b"{\"error\":{\"code\":\"throttled\",\"message\":\"mock throttle\"}}".to_vec(),
                error: None,
                retry_after: Some(retry_after_secs.to_string()),
            });
    }

    /// Binds `full_bytes` as the complete content of `resource` (a
    /// `.../content` path). A request with no `Range` header gets the
    /// whole body back with `200`; a request with `Range: bytes=a-b` gets
    /// the matching slice back with `206`.
    pub fn add_mock_content(&self, resource: &str, full_bytes: Vec<u8>) {
        self.ranged_content.insert(resource.to_string(), full_bytes);
    }

    fn ranged_response(&self, path: &str, headers: &[(String, String)]) -> Option<RawResponse> {
        let full = self.ranged_content.get(path)?;

        let range = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("range"))
            .and_then(|(_, value)| parse_byte_range(value, full.len() as u64));

        match range {
            Some((start, end)) => {
                let slice = full[start as usize..=end as usize].to_vec();
                Some(RawResponse {
                    status: reqwest::StatusCode::PARTIAL_CONTENT,
                    retry_after: None,
                    body: slice,
                })
            }
            None => Some(RawResponse {
                status: reqwest::StatusCode::OK,
                retry_after: None,
                body: full.clone(),
            }),
        }
    }

    pub fn set_faults(&self, faults: FaultConfig) {
        *self.fault.lock().expect("mock fault lock poisoned") = faults;
    }

    /// Bind a canned result to `resource` (a path relative to the Graph
    /// base URL, e.g. `/me/drive/items/abc`).
    pub fn add_mock_response(
        &self,
        resource: &str,
        body: Vec<u8>,
        status: u16,
        error: Option<String>,
    ) {
        self.responses.insert(
            resource.to_string(),
            MockResponseSpec {
                status,
                body,
                error,
                retry_after: None,
            },
        );
    }

    /// Bind a single typed item to `resource`.
    pub fn add_mock_item(&self, resource: &str, item: Value) {
        let body = serde_json::to_vec(&item).expect("serializing a mock item never fails");
        self.items.insert(resource.to_string(), item);
        self.add_mock_response(resource, body, 200, None);
    }

    /// Bind a full (unpaginated) children collection to `resource`.
    pub fn add_mock_items(&self, resource: &str, items: Vec<Value>) {
        let collection = serde_json::json!({ "value": items });
        let body = serde_json::to_vec(&collection).expect("serializing mock items never fails");
        self.add_mock_response(resource, body, 200, None);
    }

    /// Bind a children collection to `resource`, split into server-style
    /// pages of `page_size`, with synthesized `@odata.nextLink` values.
    pub fn add_mock_items_with_pagination(&self, resource: &str, items: Vec<Value>, page_size: usize) {
        if page_size == 0 {
            self.add_mock_items(resource, items);
            return;
        }

        let total = items.len();
        let mut offset = 0;
        while offset < total.max(1) {
            let end = (offset + page_size).min(total);
            let page = items[offset..end].to_vec();
            let next_offset = end;

            let key = if offset == 0 {
                resource.to_string()
            } else {
                format!("{resource}?skiptoken={offset}")
            };

            let mut collection = serde_json::json!({ "value": page });
            if next_offset < total {
                let next_link = format!("{}{}?skiptoken={}", self.base_url, resource, next_offset);
                collection["@odata.nextLink"] = Value::String(next_link);
            }

            let body = serde_json::to_vec(&collection).expect("serializing mock page never fails");
            self.add_mock_response(&key, body, 200, None);

            if total == 0 {
                break;
            }
            offset = end;
        }
    }

    /// All calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("mock call lock poisoned").clone()
    }

    /// Number of recorded calls whose path equals `path`.
    #[must_use]
    pub fn call_count(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.path == path)
            .count()
    }

    fn relative_path(&self, url: &str) -> String {
        url.strip_prefix(&self.base_url).unwrap_or(url).to_string()
    }

    fn lookup(&self, path: &str) -> Option<MockResponseSpec> {
        if let Some(mut queue) = self.once_responses.get_mut(path) {
            if let Some(spec) = queue.pop_front() {
                return Some(spec);
            }
        }

        if let Some(spec) = self.responses.get(path) {
            return Some(spec.clone());
        }

        let decoded = percent_decode_str(path).decode_utf8_lossy().to_string();
        if decoded != path {
            if let Some(spec) = self.responses.get(&decoded) {
                return Some(spec.clone());
            }
        }

        // Content URL fallback: `/items/<id>/content` vs
        // `/<parent>:/<name>:/content`.
        if path.ends_with("/content") {
            for candidate in self.responses.iter() {
                if candidate.key().ends_with("/content") {
                    return Some(candidate.value().clone());
                }
            }
        }

        None
    }

    /// Sleeps long enough to simulate `body_len` bytes crossing a link
    /// capped at `fault.bandwidth_kbps`. A no-op when no cap is set.
    async fn apply_bandwidth_cap(&self, fault: &FaultConfig, body_len: usize) {
        if let Some(kbps) = fault.bandwidth_kbps {
            if kbps > 0 {
                let seconds = (body_len as f64 / 1024.0) / kbps as f64;
                if seconds > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                }
            }
        }
    }

    async fn maybe_update_content_hash(&self, path: &str, body: &[u8]) {
        if !path.ends_with("/content") {
            return;
        }
        let item_key = path.trim_end_matches("/content");
        if let Some(mut entry) = self.items.get_mut(item_key) {
            let hash = quick_xor_base64(body);
            if let Some(file) = entry.get_mut("file") {
                if file.get("hashes").and_then(|h| h.get("pinned")).is_none() {
                    file["hashes"]["quickXorHash"] = Value::String(hash);
                }
            }
            entry["size"] = Value::Number(body.len().into());

            let refreshed = serde_json::to_vec(&*entry).expect("serializing refreshed mock item never fails");
            drop(entry);
            self.responses.insert(
                item_key.to_string(),
                MockResponseSpec {
                    status: 200,
                    body: refreshed,
                    error: None,
                    retry_after: None,
                },
            );
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a `Range: bytes=start-end` header value into an inclusive
/// `(start, end)` byte range, clamped to `total_len - 1`. Any other shape
/// (unparseable, multi-range, suffix range) is treated as no range.
fn parse_byte_range(value: &str, total_len: u64) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    let start: u64 = start_str.trim().parse().ok()?;
    let end: u64 = end_str.trim().parse().unwrap_or(total_len.saturating_sub(1));
    if start > end || start >= total_len {
        return None;
    }
    Some((start, end.min(total_len.saturating_sub(1))))
}

static THROTTLE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: RawRequest) -> Result<RawResponse, GraphError> {
        let path = self.relative_path(&request.url);

        self.calls.lock().expect("mock call lock poisoned").push(MockCall {
            method: request.method.to_string(),
            path: path.clone(),
            body: request.body.clone(),
            time: Instant::now(),
        });

        let fault = self.fault.lock().expect("mock fault lock poisoned").clone();
        let total_delay = fault.latency + fault.additional_delay;
        if !total_delay.is_zero() {
            tokio::time::sleep(total_delay).await;
        }

        if fault.packet_loss_probability > 0.0
            && rand::thread_rng().gen_bool(fault.packet_loss_probability.min(1.0))
        {
            return Err(GraphError::NetworkError("mock packet loss".to_string()));
        }

        if fault.random_error_rate > 0.0
            && rand::thread_rng().gen_bool(fault.random_error_rate.min(1.0))
        {
            return Err(GraphError::OperationError("mock random error injection".to_string()));
        }

        if fault.throttle_probability > 0.0
            && rand::thread_rng().gen_bool(fault.throttle_probability.min(1.0))
        {
            THROTTLE_COUNTER.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(fault.throttle_delay).await;
            return Ok(RawResponse {
                status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                retry_after: Some(fault.throttle_delay.as_secs().to_string()),
                body: b"{\"error\":{\"code\":\"throttled\",\"message\":\"mock throttle\"}}".to_vec(),
            });
        }

        if request.method == reqwest::Method::PUT {
            if let Some(body) = &request.body {
                self.maybe_update_content_hash(&path, body).await;
            }
        }

        if request.method == reqwest::Method::GET {
            if let Some(response) = self.ranged_response(&path, &request.headers) {
                self.apply_bandwidth_cap(&fault, response.body.len()).await;
                return Ok(response);
            }
        }

        let result = match self.lookup(&path) {
            Some(spec) => {
                if let Some(error) = spec.error {
                    return Err(GraphError::NetworkError(error));
                }
                RawResponse {
                    status: reqwest::StatusCode::from_u16(spec.status)
                        .unwrap_or(reqwest::StatusCode::OK),
                    retry_after: spec.retry_after,
                    body: spec.body,
                }
            }
            None => RawResponse {
                status: reqwest::StatusCode::NOT_FOUND,
                retry_after: None,
                body: format!(
                    "{{\"error\":{{\"code\":\"itemNotFound\",\"message\":\"no mock bound for {path}\"}}}}"
                )
                .into_bytes(),
            },
        };

        self.apply_bandwidth_cap(&fault, result.body.len()).await;
        Ok(result)
    }

    fn honors_offline_flag(&self) -> bool {
        false
    }
}
