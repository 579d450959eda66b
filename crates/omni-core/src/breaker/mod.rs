//! Quota-aware circuit breaker (C7).
//!
//! Wraps calls to quota-sensitive downstream services (embedding, LLM
//! contextualisation/translation, reranking). Opens on quota errors, queues
//! callers FIFO, and periodically probes for recovery. Modeled as state
//! guarded by a short critical section plus a single background task that
//! owns the recovery probe, per the design notes: avoid running probes
//! concurrently with drains.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::error::OmniResult;

/// Breaker state machine (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type RetryJob = Box<dyn Fn() -> BoxFuture<JobOutcome> + Send + Sync>;

struct JobOutcome {
    quota: bool,
}

struct Inner {
    state: AsyncMutex<State>,
    queue: AsyncMutex<VecDeque<RetryJob>>,
    consecutive_failures: AtomicU32,
    failure_threshold: u32,
    retry_interval: Duration,
}

/// A shared circuit breaker instance. Clone is cheap (`Arc` internally); a
/// single instance may be reused across the contextualiser, translator, and
/// embedder call paths, per §4.7.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker with the given recovery probe interval, failure
    /// threshold (default 1), and spawn its background probe task.
    pub fn new(retry_interval: Duration, failure_threshold: u32) -> Self {
        let inner = Arc::new(Inner {
            state: AsyncMutex::new(State::Closed),
            queue: AsyncMutex::new(VecDeque::new()),
            consecutive_failures: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
            retry_interval,
        });

        let probe_inner = inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe_inner.retry_interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                probe_tick(&probe_inner).await;
            }
        });

        Self { inner }
    }

    /// Construct with the §4.7 defaults (`failure_threshold = 1`).
    pub fn with_defaults(retry_interval: Duration) -> Self {
        Self::new(retry_interval, 1)
    }

    /// Run `f`. In `CLOSED`, runs immediately; on a quota error that reaches
    /// the failure threshold, opens the breaker and enqueues this call for
    /// later retry. In `OPEN`/`HALF_OPEN`, enqueues immediately. The caller
    /// awaits the eventual resolution either way.
    pub async fn execute<F, Fut, T>(&self, f: F) -> OmniResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OmniResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let is_closed = matches!(*self.inner.state.lock().await, State::Closed);

        if is_closed {
            let result = f().await;
            match result {
                Ok(value) => {
                    self.inner.consecutive_failures.store(0, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) if e.is_quota() => {
                    let failures = self.inner.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    if failures >= self.inner.failure_threshold {
                        *self.inner.state.lock().await = State::Open;
                        return self.enqueue(f).await;
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        self.enqueue(f).await
    }

    async fn enqueue<F, Fut, T>(&self, f: F) -> OmniResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OmniResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(StdMutex::new(Some(tx)));
        let f = Arc::new(f);

        let job: RetryJob = Box::new(move || {
            let tx = tx.clone();
            let f = f.clone();
            Box::pin(async move {
                let result = f().await;
                let quota = matches!(&result, Err(e) if e.is_quota());
                if !quota {
                    if let Some(sender) = tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
                        let _ = sender.send(result);
                    }
                }
                JobOutcome { quota }
            })
        });

        self.inner.queue.lock().await.push_back(job);

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(crate::error::OmniError::Internal(
                "circuit breaker dropped queued call without resolving it".to_string(),
            )),
        }
    }

    /// Current state, exposed for tests and diagnostics.
    async fn is_open(&self) -> bool {
        !matches!(*self.inner.state.lock().await, State::Closed)
    }
}

/// One probe tick: transition `OPEN` → `HALF_OPEN`, run the front of the
/// queue, and on success drain the rest FIFO; a quota error during the drain
/// returns that item to the head of the queue and keeps the breaker open.
async fn probe_tick(inner: &Arc<Inner>) {
    {
        let mut state = inner.state.lock().await;
        if *state != State::Open {
            return;
        }
        *state = State::HalfOpen;
    }

    loop {
        let job = {
            let mut queue = inner.queue.lock().await;
            queue.pop_front()
        };

        let Some(job) = job else {
            *inner.state.lock().await = State::Closed;
            inner.consecutive_failures.store(0, Ordering::Relaxed);
            return;
        };

        let outcome = job().await;
        if outcome.quota {
            let mut queue = inner.queue.lock().await;
            queue.push_front(job);
            *inner.state.lock().await = State::Open;
            return;
        }
        // success or non-quota failure: caller already resolved, keep draining.
    }
}

/// A provider error description used by the quota classifier (§4.7). HTTP
/// clients for the embedding/contextualiser/translator/reranker providers
/// build one of these from the raw response before deciding whether to
/// surface `OmniError::Quota` or `OmniError::Provider`.
#[derive(Debug, Clone, Default)]
pub struct ProviderErrorInfo {
    /// Machine-readable error code, e.g. `"RESOURCE_EXHAUSTED"`.
    pub code: Option<String>,
    /// HTTP status code, when the transport is HTTP.
    pub http_status: Option<u16>,
    /// Human-readable error message.
    pub message: String,
    /// Nested causes, for composite/wrapped retry errors.
    pub causes: Vec<ProviderErrorInfo>,
}

/// Exact quota classifier (§4.7): true when any of the code/status/message
/// rules match on this error or (recursively) on any of its nested causes.
pub fn is_quota_error(info: &ProviderErrorInfo) -> bool {
    if info.code.as_deref() == Some("RESOURCE_EXHAUSTED") {
        return true;
    }
    if info.http_status == Some(429) {
        return true;
    }

    let lower = info.message.to_lowercase();
    let needles = ["resource_exhausted", "quota exceeded", "quota", "rate limit"];
    if needles.iter().any(|needle| lower.contains(needle)) {
        return true;
    }

    info.causes.iter().any(is_quota_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmniError;
    use std::sync::atomic::AtomicU32 as StdAtomicU32;
    use std::time::Duration;

    fn quota_err() -> OmniError {
        OmniError::Quota {
            provider: "test".to_string(),
            reason: "rate limit exceeded".to_string(),
        }
    }

    #[test]
    fn test_quota_classifier_http_429() {
        let info = ProviderErrorInfo {
            http_status: Some(429),
            ..Default::default()
        };
        assert!(is_quota_error(&info));
    }

    #[test]
    fn test_quota_classifier_resource_exhausted_code() {
        let info = ProviderErrorInfo {
            code: Some("RESOURCE_EXHAUSTED".to_string()),
            ..Default::default()
        };
        assert!(is_quota_error(&info));
    }

    #[test]
    fn test_quota_classifier_message_substring_case_insensitive() {
        let info = ProviderErrorInfo {
            message: "Quota Exceeded for this project".to_string(),
            ..Default::default()
        };
        assert!(is_quota_error(&info));
    }

    #[test]
    fn test_quota_classifier_recurses_into_causes() {
        let info = ProviderErrorInfo {
            message: "composite retry error".to_string(),
            causes: vec![ProviderErrorInfo {
                message: "nested: rate limit hit".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(is_quota_error(&info));
    }

    #[test]
    fn test_quota_classifier_rejects_unrelated_error() {
        let info = ProviderErrorInfo {
            message: "connection reset by peer".to_string(),
            ..Default::default()
        };
        assert!(!is_quota_error(&info));
    }

    #[tokio::test]
    async fn test_closed_breaker_runs_immediately_on_success() {
        let breaker = CircuitBreaker::with_defaults(Duration::from_millis(50));
        let result = breaker.execute(|| async { Ok::<_, OmniError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn test_quota_error_opens_breaker_and_eventually_resolves() {
        let breaker = CircuitBreaker::with_defaults(Duration::from_millis(30));
        let attempts = Arc::new(StdAtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let call = move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(quota_err())
                } else {
                    Ok::<_, OmniError>(7)
                }
            }
        };

        let result = tokio::time::timeout(Duration::from_secs(2), breaker.execute(call)).await;
        assert_eq!(result.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_non_quota_error_propagates_immediately_without_opening() {
        let breaker = CircuitBreaker::with_defaults(Duration::from_millis(50));
        let result = breaker
            .execute(|| async { Err::<i32, _>(OmniError::Internal("boom".to_string())) })
            .await;
        assert!(result.is_err());
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn test_fifo_ordering_of_queued_callers() {
        let breaker = CircuitBreaker::with_defaults(Duration::from_millis(30));
        let order = Arc::new(StdMutex::new(Vec::<u32>::new()));

        // First caller trips the breaker open.
        let _ = breaker
            .execute(|| async { Err::<i32, _>(quota_err()) })
            .await;

        let mut handles = Vec::new();
        for id in 1..=3u32 {
            let breaker = breaker.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let result = breaker.execute(move || async move { Ok::<_, OmniError>(id) }).await;
                if let Ok(value) = result {
                    order.lock().unwrap().push(value);
                }
            }));
        }

        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }
}
