//! Request executor
//!
//! Issues one HTTP call for a built [`ProviderRequest`] and normalizes the
//! outcome to either raw completion text or a typed [`ProviderError`]. Retry
//! and fallback live above this layer.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::error::ProviderError;
use super::registry::ProviderDescriptor;
use super::request::{ProviderRequest, parse_error_body, parse_response};

/// Execute one request against a provider endpoint.
///
/// - transport errors become [`ProviderError::Network`] immediately
/// - a non-2xx status becomes [`ProviderError::Api`] with the error parser's
///   message (a non-JSON error body is tolerated)
/// - a 2xx body that is not JSON is a [`ProviderError::Serialization`]
/// - missing/empty completion text is a [`ProviderError::EmptyResponse`]
///
/// The returned text is trimmed and stripped of one wrapping Markdown code
/// fence, since models routinely fence JSON output.
pub async fn execute(
    client: &Client,
    descriptor: &ProviderDescriptor,
    request: &ProviderRequest,
) -> Result<String, ProviderError> {
    let provider = descriptor.id;

    debug!(provider, url = %request.url, "dispatching provider request");

    let mut builder = client.post(&request.url).json(&request.body);
    for (name, value) in &request.headers {
        builder = builder.header(*name, value);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| ProviderError::network(provider, format!("Request failed: {}", e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::network(provider, format!("Failed to read response: {}", e)))?;

    debug!(provider, status = status.as_u16(), "provider response received");

    let parsed: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        let message = parse_error_body(
            descriptor.mode,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status"),
            parsed.as_ref(),
        );
        return Err(ProviderError::api(provider, status.as_u16(), message));
    }

    let body = parsed.ok_or_else(|| {
        ProviderError::serialization(provider, "Response body is not valid JSON".to_string())
    })?;

    let content = parse_response(descriptor.mode, &body)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse { provider })?;

    Ok(strip_code_fence(content.trim()).to_string())
}

/// Strip one wrapping Markdown code fence (``` or ```json) from text.
///
/// Only a fence that wraps the whole value is removed; fences inside the
/// content stay untouched.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_fence) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line (```json)
    let rest = match after_fence.find('\n') {
        Some(idx) => &after_fence[idx + 1..],
        None => after_fence,
    };

    match rest.rfind("```") {
        Some(idx) => rest[..idx].trim(),
        None => rest.trim(),
    }
}
