//! Backend that forwards requests to a remote evaluation engine.
//!
//! The engine exposes a single endpoint, `POST {base_url}/evaluate`, which
//! takes a JSON [`EvaluationRequest`] and answers with a JSON
//! [`Evaluation`]. An engine-side failure is reported as
//! `{"error": "<message>"}` with a success status.

use std::time::Duration;

use async_trait::async_trait;

use crate::retry::{self, RetryPolicy};
use crate::{BackendError, Evaluation, EvaluationBackend, EvaluationRequest};

/// Per-request timeout applied by the HTTP client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Evaluates requests on a remote engine over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpBackend {
    /// Creates a backend for the engine at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint(base_url),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Full URL of the evaluation endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint(base_url: &str) -> String {
    format!("{}/evaluate", base_url.trim_end_matches('/'))
}

/// Decodes an engine response body.
fn decode(body: serde_json::Value) -> Result<Evaluation, BackendError> {
    if let Some(message) = body.get("error").and_then(serde_json::Value::as_str) {
        return Err(BackendError::Evaluation {
            message: message.to_string(),
        });
    }
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl EvaluationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, BackendError> {
        log::debug!("POST {}", self.endpoint);
        let body = retry::send_json(
            || self.client.post(&self.endpoint).json(request),
            self.retry,
        )
        .await?;
        decode(body)
    }
}
