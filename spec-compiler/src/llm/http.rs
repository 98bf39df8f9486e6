//! HTTP plumbing shared by the hosted backends.

use super::LlmError;
use crate::pipeline::retry::{retry_classified, RetryConfig};
use crate::utils::{redact_secrets, redacted_excerpt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};

const MAX_BODY_EXCERPT_CHARS: usize = 500;

/// Builds a client that sends `headers` on every request.
pub(super) fn build_client(
    headers: &[(&'static str, &str)],
    timeout: Duration,
) -> Result<reqwest::Client, LlmError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let mut value = HeaderValue::from_str(value)
            .map_err(|_| LlmError::Configuration(format!("invalid value for header {name}")))?;
        value.set_sensitive(true);
        map.insert(HeaderName::from_static(name), value);
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(map)
        .build()
        .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))
}

async fn post_once<R: DeserializeOwned>(client: &reqwest::Client, url: &str, body: &Value) -> Result<R, LlmError> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::api(None, redact_secrets(&e.to_string()))
        }
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::api(None, redact_secrets(&e.to_string()))
        }
    })?;

    if !status.is_success() {
        return Err(LlmError::api(
            Some(status.as_u16()),
            redacted_excerpt(&text, MAX_BODY_EXCERPT_CHARS),
        ));
    }

    serde_json::from_str(&text).map_err(|e| {
        LlmError::api(Some(status.as_u16()), format!("failed to parse API response: {e}"))
    })
}

/// Posts `body` to `url`, retrying what [`LlmError::is_retryable`] accepts.
///
/// Returns the decoded response and the total latency.
pub(super) async fn post_with_retry<R: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
    retry: &RetryConfig,
    provider: &'static str,
    request_id: &str,
) -> Result<(R, Duration), LlmError> {
    let started = Instant::now();
    let outcome = retry_classified(retry, provider, LlmError::is_retryable, |attempt| {
        tracing::info!(provider, request_id, attempt, max_attempts = retry.max_attempts, "Calling model backend");
        post_once::<R>(client, url, body)
    })
    .await;
    let latency = started.elapsed();

    match outcome.result {
        Ok(response) => Ok((response, latency)),
        Err(error) => {
            tracing::error!(
                provider,
                request_id,
                attempts = outcome.attempts,
                latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Model backend call failed"
            );
            Err(error)
        }
    }
}

/// Milliseconds as a JSON-friendly float.
pub(super) fn latency_ms(latency: Duration) -> f64 {
    latency.as_secs_f64() * 1000.0
}
