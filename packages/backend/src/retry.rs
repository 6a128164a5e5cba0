//! HTTP retry helpers for transient errors.
//!
//! Every request to the remote evaluation engine goes through
//! [`send_json`], which retries connection failures, timeouts, HTTP 429 and
//! HTTP 5xx with exponential backoff. Other 4xx responses are permanent and
//! returned immediately as [`BackendError::Status`].

use std::time::Duration;

use crate::BackendError;

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// How many times and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Five retries at 2s, 4s, 8s, 16s and 32s.
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Sends a request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`BackendError::Http`] if the request cannot be sent after all
/// retries, [`BackendError::Status`] for a non-retryable or exhausted
/// status code, and [`BackendError::Json`] if the body is not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    policy: RetryPolicy,
) -> Result<serde_json::Value, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, policy).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed\n  url: {url}\n  received: {} bytes\n  body preview: {}",
            text.len(),
            preview(&text)
        );
        BackendError::Json(e)
    })
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    policy: RetryPolicy,
) -> Result<reqwest::Response, BackendError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(BackendError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    return Ok(response);
                }

                if is_retryable_status(status) && attempt < max_retries {
                    log::warn!("  HTTP {status}");
                    attempt += 1;
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                let message = if body.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("no response body")
                        .to_string()
                } else {
                    preview(&body)
                };
                if is_retryable_status(status) {
                    log::error!("HTTP {status} after {max_retries} retries, giving up");
                }
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    message,
                });
            }
        }
    }
}

/// Whether a response status is worth retrying (429 and 5xx).
#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
