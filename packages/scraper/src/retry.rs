//! HTTP retry helpers for transient errors.
//!
//! Page requests go through [`send_text`]. Report downloads wrap
//! [`send_checked`] and payload validation in [`with_retry`], so an empty
//! body is retried like a timeout. Timeouts, connection resets, HTTP 429
//! and 5xx are retried with exponential backoff; other 4xx responses are
//! permanent.
//!
//! ```ignore
//! let html = retry::send_text(|| client.get(url), &RetryPolicy::default()).await?;
//! ```

use std::time::Duration;

use crate::FetchError;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that does not sleep between attempts.
    #[must_use]
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt number `attempt` (0-based). The first attempt is
    /// never delayed.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(1u32 << (attempt - 1).min(16))
    }
}

/// Sends a request and returns the body as text.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails after all attempts or the
/// server returns a permanent error status.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F, policy: &RetryPolicy) -> Result<String, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    with_retry(policy, || async {
        let response = send_checked(&build_request).await?;
        Ok(response.text().await?)
    })
    .await
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts are exhausted.
///
/// # Errors
///
/// Returns the last [`FetchError`] produced by `operation`.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            log::warn!("  retry {attempt}/{} in {delay:?}...", attempts - 1);
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                log::warn!("  transient error: {e}");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sends a request once, mapping 4xx/5xx responses to
/// [`FetchError::Status`].
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails or the status is an error.
#[allow(clippy::future_not_send)]
pub async fn send_checked<F>(build_request: &F) -> Result<reqwest::Response, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = build_request().send().await?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Returns `true` if the error is likely transient and worth retrying.
#[must_use]
pub fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
