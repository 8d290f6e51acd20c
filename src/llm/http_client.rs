use super::scrub::sanitize_api_error;
use crate::error::LlmError;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub fn build_adapter_client() -> Client {
    build_adapter_client_with_timeout(120)
}

pub fn build_adapter_client_with_timeout(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a transport-level failure to a classified error.
pub fn send_error(adapter: &str, err: &reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        LlmError::Timeout {
            adapter: adapter.to_string(),
        }
        .into()
    } else {
        LlmError::Request {
            adapter: adapter.to_string(),
            message: sanitize_api_error(&err.to_string()),
        }
        .into()
    }
}

/// Pass successful responses through; turn the rest into an [`LlmError`]
/// the control loop can classify.
pub async fn ensure_success(
    adapter: &str,
    response: reqwest::Response,
) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    Err(status_error(adapter, status, &body, retry_after).into())
}

pub fn status_error(
    adapter: &str,
    status: StatusCode,
    body: &str,
    retry_after: Option<u64>,
) -> LlmError {
    let adapter = adapter.to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            adapter,
            retry_after_secs: retry_after.unwrap_or(0),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth { adapter },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LlmError::Timeout { adapter },
        _ => LlmError::Request {
            message: format!("API error ({status}): {}", sanitize_api_error(body)),
            adapter,
        },
    }
}
