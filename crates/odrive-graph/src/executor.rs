//! The single authenticated-request primitive. Every Graph operation in
//! `items` goes through this.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use odrive_core::ports::UserAgentHook;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::auth::AuthStore;
use crate::cache::ResponseCache;
use crate::retry::{run_with_backoff, RetryConfig, RetryQueue};
use crate::transport::{HttpSession, RawRequest};
use crate::{classify_error_response, GraphError};

/// A single authenticated call against one resource path. Owns nothing;
/// everything it needs is passed in or reached through the session.
pub struct Executor {
    session: Arc<HttpSession>,
    auth: Arc<AuthStore>,
    cache: Arc<ResponseCache>,
    retry_config: RetryConfig,
    retry_queue: Arc<RetryQueue>,
    user_agent: Arc<dyn UserAgentHook>,
}

/// What the caller wants done with a successful response, beyond returning
/// its bytes: whether to treat it as a cacheable GET, or to run mutation
/// invalidation against the target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheIntent {
    /// A GET with no extra headers: check the cache first; populate it on
    /// a miss.
    CacheableGet,
    /// A GET that should bypass the cache entirely (has extra headers, e.g.
    /// a `Range` request).
    BypassGet,
    /// A non-GET mutation: invalidate the cache for this resource on
    /// success.
    Mutation,
}

impl Executor {
    #[must_use]
    pub fn new(
        session: Arc<HttpSession>,
        auth: Arc<AuthStore>,
        cache: Arc<ResponseCache>,
        retry_queue: Arc<RetryQueue>,
        user_agent: Arc<dyn UserAgentHook>,
    ) -> Self {
        Self {
            session,
            auth,
            cache,
            retry_config: RetryConfig::default(),
            retry_queue,
            user_agent,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// The Graph base URL this executor's requests are resolved against,
    /// so callers (e.g. `items`) can relativize an absolute continuation
    /// link before reusing it as a `path`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// Executes one authenticated request against `path` (relative to the
    /// Graph base URL), with retry, reauth-on-401, and cache handling.
    ///
    /// `cancel` is consulted before refresh, before send, and while a retry
    /// delay is pending; a cancellation at any of those points yields
    /// [`GraphError::Cancelled`] rather than a spurious retry.
    #[instrument(skip(self, body, cancel))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(String, String)],
        intent: CacheIntent,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GraphError> {
        if intent == CacheIntent::CacheableGet {
            if let Some(cached) = self.cache.get(path) {
                return Ok(cached);
            }
        }

        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }

        if self.session.is_offline().await {
            return Err(GraphError::NetworkError(
                "operational offline mode is enabled".to_string(),
            ));
        }

        let reqwest_client = reqwest::Client::new();
        if let Err(e) = self.auth.refresh(&reqwest_client).await {
            warn!(error = %e, "token refresh before request failed; proceeding with current token");
        }

        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }

        // Only a literal HTTP 401 on the wire triggers reauth (spec §4.3,
        // §4.6): `try_once` sets this when it sees one, as distinct from a
        // 403 or an empty-credential guard, both of which also surface as
        // `GraphError::AuthError` but are terminal -- reauth cannot fix a
        // permissions error or a missing token.
        let saw_401 = AtomicBool::new(false);

        let result = run_with_backoff(path, &self.retry_config, &self.retry_queue, cancel, || {
            self.try_once(method.clone(), path, body.clone(), extra_headers, &saw_401)
        })
        .await;

        let body_bytes = match result {
            Ok(bytes) => bytes,
            Err(GraphError::AuthError(_)) if saw_401.load(Ordering::Relaxed) => {
                self.auth
                    .reauth(&reqwest_client, &self.user_agent)
                    .await?;
                saw_401.store(false, Ordering::Relaxed);
                run_with_backoff(path, &self.retry_config, &self.retry_queue, cancel, || {
                    self.try_once(method.clone(), path, body.clone(), extra_headers, &saw_401)
                })
                .await?
            }
            Err(GraphError::ResourceBusy { retry_after }) => {
                self.drain_queued(method, path, body, extra_headers, retry_after, cancel)
                    .await?
            }
            Err(other) => return Err(other),
        };

        match intent {
            CacheIntent::CacheableGet => self.cache.put(path.to_string(), body_bytes.clone()),
            CacheIntent::Mutation => self.cache.invalidate_for_mutation(path),
            CacheIntent::BypassGet => {}
        }

        Ok(body_bytes)
    }

    /// Keeps replaying a request that `run_with_backoff` has already parked
    /// on `self.retry_queue` after exhausting its retries on a rate-limit
    /// error. From the caller's point of view this is still the same
    /// `execute` future; it never resolves to `ResourceBusy` itself, only
    /// to an eventual success or to a later, unrelated terminal error. This
    /// is the queue's one drainer: each parked request is replayed serially
    /// by the call that queued it, at the server-given (or capped) pace,
    /// until it succeeds, fails for another reason, or is cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn drain_queued(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(String, String)],
        mut retry_after: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GraphError> {
        loop {
            let wait = retry_after.unwrap_or(self.retry_config.max_delay);
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = cancel.cancelled() => {
                    self.retry_queue.dequeue();
                    return Err(GraphError::Cancelled);
                }
            }

            let saw_401 = AtomicBool::new(false);
            match self
                .try_once(method.clone(), path, body.clone(), extra_headers, &saw_401)
                .await
            {
                Ok(bytes) => {
                    self.retry_queue.dequeue();
                    return Ok(bytes);
                }
                Err(GraphError::ResourceBusy { retry_after: next }) => {
                    warn!(path, "still rate-limited while draining queue; waiting again");
                    retry_after = next;
                }
                Err(other) => {
                    self.retry_queue.dequeue();
                    return Err(other);
                }
            }
        }
    }

    async fn try_once(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(String, String)],
        saw_401: &AtomicBool,
    ) -> Result<Vec<u8>, GraphError> {
        let record = self.auth.snapshot().await;
        if record.access_token.is_empty() {
            return Err(GraphError::AuthError(
                "no access token available".to_string(),
            ));
        }

        let mut headers = vec![(
            "authorization".to_string(),
            format!("bearer {}", record.access_token),
        )];
        match method {
            Method::PATCH => {
                headers.push(("if-match".to_string(), "*".to_string()));
                headers.push(("content-type".to_string(), "application/json".to_string()));
            }
            Method::POST => {
                headers.push(("content-type".to_string(), "application/json".to_string()));
            }
            Method::PUT => {
                headers.push(("content-type".to_string(), "text/plain".to_string()));
            }
            _ => {}
        }
        headers.extend(extra_headers.iter().cloned());

        let url = format!("{}{}", self.session.base_url(), path);
        let request = RawRequest {
            method,
            url,
            headers,
            body,
        };

        let response = self.session.send(request).await?;

        if response.status.is_success() {
            return Ok(response.body);
        }

        if response.status.as_u16() == 401 {
            saw_401.store(true, Ordering::Relaxed);
            return Err(GraphError::AuthError("access token rejected".to_string()));
        }

        if response.status.as_u16() == 429 {
            let retry_after = response
                .retry_after
                .map(|v| crate::retry::parse_retry_after(&v, std::time::Duration::from_secs(30)));
            return Err(GraphError::ResourceBusy { retry_after });
        }

        let body_str = String::from_utf8_lossy(&response.body).to_string();
        Err(classify_error_response(response.status, &body_str))
    }
}
