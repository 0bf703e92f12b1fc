use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use log::debug;
use reqsend_core::{Context, Error, Result};

use crate::constants::*;

/// Strategy used by the client to put a signed request on the wire.
#[async_trait]
pub trait SendRequest: Debug + Send + Sync + 'static {
    /// Send the request, returning the final response.
    ///
    /// Transport failures come back as errors, every status code as a response.
    async fn send(&self, ctx: &Context, req: Request<Bytes>) -> Result<Response<Bytes>>;
}

/// When and how long to wait before retrying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: usize,
    backoff: Duration,
    transient: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
            transient: DEFAULT_TRANSIENT_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy retrying the default transient status codes.
    ///
    /// `attempts` counts the first try too and must be at least one.
    pub fn new(attempts: usize, backoff: Duration) -> Result<Self> {
        if attempts == 0 {
            return Err(Error::config_invalid(
                "retry policy needs at least one attempt",
            ));
        }

        Ok(Self {
            attempts,
            backoff,
            ..Default::default()
        })
    }

    /// Replace the status codes worth retrying.
    pub fn with_transient_status_codes(
        mut self,
        codes: impl IntoIterator<Item = StatusCode>,
    ) -> Self {
        self.transient = codes.into_iter().collect();
        self
    }

    /// Total number of attempts.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Check if a response with this status should be retried.
    pub fn is_transient(&self, status: StatusCode) -> bool {
        self.transient.contains(&status)
    }

    /// Wait before the attempt following `attempt`, counted from zero.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

/// Sender retrying responses with transient status codes, waiting
/// `backoff * 2^attempt` between attempts.
#[derive(Debug, Clone, Default)]
pub struct RetrySender {
    policy: RetryPolicy,
}

impl RetrySender {
    /// Create a sender with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl SendRequest for RetrySender {
    async fn send(&self, ctx: &Context, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = req.into_parts();

        let mut attempt = 0;
        loop {
            let mut attempt_req = Request::new(body.clone());
            *attempt_req.method_mut() = parts.method.clone();
            *attempt_req.uri_mut() = parts.uri.clone();
            *attempt_req.version_mut() = parts.version;
            *attempt_req.headers_mut() = parts.headers.clone();

            let resp = ctx.http_send(attempt_req).await?;
            let status = resp.status();

            attempt += 1;
            if attempt >= self.policy.attempts || !self.policy.is_transient(status) {
                return Ok(resp);
            }

            let wait = self.policy.backoff_for(attempt - 1);
            debug!(
                "{} {} answered {status}, retrying in {wait:?} ({attempt}/{})",
                parts.method, parts.uri, self.policy.attempts
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Sender making exactly one attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetrySender;

#[async_trait]
impl SendRequest for NoRetrySender {
    async fn send(&self, ctx: &Context, req: Request<Bytes>) -> Result<Response<Bytes>> {
        ctx.http_send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqsend_core::HttpSend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Answers with the given statuses in order, repeating the last one.
    #[derive(Debug, Clone)]
    struct ScriptedHttpSend {
        statuses: Arc<Mutex<Vec<StatusCode>>>,
        attempts: Arc<AtomicUsize>,
        fail_transport: bool,
    }

    impl ScriptedHttpSend {
        fn new(statuses: &[StatusCode]) -> Self {
            Self {
                statuses: Arc::new(Mutex::new(statuses.iter().rev().copied().collect())),
                attempts: Arc::new(AtomicUsize::new(0)),
                fail_transport: false,
            }
        }
    }

    #[async_trait]
    impl HttpSend for ScriptedHttpSend {
        async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.body().as_ref(), b"payload");

            if self.fail_transport {
                return Err(Error::transport("connection refused"));
            }

            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop().unwrap()
            } else {
                statuses[0]
            };

            Ok(Response::builder()
                .status(status)
                .body(Bytes::from_static(b"body"))
                .unwrap())
        }
    }

    fn request() -> Request<Bytes> {
        Request::put("https://account.blob.core.windows.net/c/b")
            .body(Bytes::from_static(b"payload"))
            .unwrap()
    }

    #[test]
    fn test_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 5);
        assert!(policy.is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(policy.is_transient(StatusCode::REQUEST_TIMEOUT));
        assert!(!policy.is_transient(StatusCode::NOT_FOUND));
        assert!(!policy.is_transient(StatusCode::NOT_IMPLEMENTED));
        assert_eq!(policy.backoff_for(0), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(40));

        assert!(RetryPolicy::new(0, Duration::from_secs(1)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() -> Result<()> {
        let http = ScriptedHttpSend::new(&[
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::CREATED,
        ]);
        let ctx = Context::new().with_http_send(http.clone());
        let sender = RetrySender::new(RetryPolicy::new(5, Duration::from_secs(1))?);

        let start = Instant::now();
        let resp = sender.send(&ctx, request()).await?;

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(http.attempts.load(Ordering::SeqCst), 3);
        // 1s after the first attempt, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_returns_last_response() -> Result<()> {
        let http = ScriptedHttpSend::new(&[StatusCode::SERVICE_UNAVAILABLE]);
        let ctx = Context::new().with_http_send(http.clone());
        let sender = RetrySender::default();

        let start = Instant::now();
        let resp = sender.send(&ctx, request()).await?;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.body().as_ref(), b"body");
        assert_eq!(http.attempts.load(Ordering::SeqCst), 5);
        // 5 + 10 + 20 + 40, no wait after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(75));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_status_is_not_retried() -> Result<()> {
        let http = ScriptedHttpSend::new(&[StatusCode::NOT_FOUND]);
        let ctx = Context::new().with_http_send(http.clone());

        let resp = RetrySender::default().send(&ctx, request()).await?;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(http.attempts.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let mut http = ScriptedHttpSend::new(&[StatusCode::OK]);
        http.fail_transport = true;
        let ctx = Context::new().with_http_send(http.clone());

        let err = RetrySender::default()
            .send(&ctx, request())
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(http.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_future_cancels_backoff() {
        let http = ScriptedHttpSend::new(&[StatusCode::SERVICE_UNAVAILABLE]);
        let ctx = Context::new().with_http_send(http.clone());
        let sender = RetrySender::default();

        let fut = sender.send(&ctx, request());
        let res = tokio::time::timeout(Duration::from_secs(7), fut).await;

        assert!(res.is_err());
        // First attempt, 5s wait, second attempt, then cancelled during the 10s wait.
        assert_eq!(http.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_sender() -> Result<()> {
        let http = ScriptedHttpSend::new(&[StatusCode::SERVICE_UNAVAILABLE, StatusCode::OK]);
        let ctx = Context::new().with_http_send(http.clone());

        let resp = NoRetrySender.send(&ctx, request()).await?;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http.attempts.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
