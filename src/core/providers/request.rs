//! Request building and response parsing per wire format
//!
//! Pure transformations: (descriptor, credentials, prompt, options) in,
//! concrete HTTP request out, plus the matching response and error parsers.
//! No network or storage side effects here.

use serde_json::{Value, json};

use super::registry::{CompatMode, ProviderDescriptor};

/// Anthropic messages API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Sampling options for one completion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

/// Inputs to [`build_request`]
#[derive(Debug, Clone)]
pub struct RequestParams<'a> {
    pub api_key: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
    pub options: CompletionOptions,
    /// Replaces the descriptor's base URL verbatim when non-empty (proxies,
    /// self-hosted compatible endpoints)
    pub override_base_url: Option<&'a str>,
}

/// A concrete HTTP request, ready for the executor
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

fn effective_base_url<'a>(descriptor: &'a ProviderDescriptor, params: &RequestParams<'a>) -> &'a str {
    match params.override_base_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => descriptor.base_url,
    }
}

/// Build the provider-specific POST request for one prompt
pub fn build_request(descriptor: &ProviderDescriptor, params: &RequestParams<'_>) -> ProviderRequest {
    let base = effective_base_url(descriptor, params).trim_end_matches('/');

    match descriptor.mode {
        CompatMode::OpenAiLike => ProviderRequest {
            url: format!("{}/chat/completions", base),
            headers: vec![
                ("content-type", "application/json".to_string()),
                ("authorization", format!("Bearer {}", params.api_key)),
            ],
            body: json!({
                "model": params.model,
                "messages": [{"role": "user", "content": params.prompt}],
                "temperature": params.options.temperature,
                "max_tokens": params.options.max_tokens,
            }),
        },
        CompatMode::GoogleGenerative => ProviderRequest {
            url: format!("{}/models/{}:generateContent", base, params.model),
            headers: vec![
                ("content-type", "application/json".to_string()),
                ("x-goog-api-key", params.api_key.to_string()),
            ],
            body: json!({
                "contents": [{"parts": [{"text": params.prompt}]}],
                "generationConfig": {
                    "temperature": params.options.temperature,
                    "maxOutputTokens": params.options.max_tokens,
                },
            }),
        },
        CompatMode::AnthropicMessages => ProviderRequest {
            url: format!("{}/messages", base),
            headers: vec![
                ("content-type", "application/json".to_string()),
                ("x-api-key", params.api_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            body: json!({
                "model": params.model,
                "max_tokens": params.options.max_tokens,
                "messages": [{"role": "user", "content": params.prompt}],
            }),
        },
    }
}

/// Extract the completion text from a successful response body
pub fn parse_response(mode: CompatMode, body: &Value) -> Option<String> {
    let content = match mode {
        CompatMode::OpenAiLike => body
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?,
        CompatMode::GoogleGenerative => body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .get(0)?
            .get("text")?,
        CompatMode::AnthropicMessages => body.get("content")?.get(0)?.get("text")?,
    };
    content.as_str().map(|s| s.to_string())
}

/// Produce a human-readable message for a non-2xx response.
///
/// Prefers the message inside the parsed error body; falls back to
/// `"{status} {reason}"` when the body is absent or not in the expected
/// shape.
pub fn parse_error_body(
    mode: CompatMode,
    status: u16,
    reason: &str,
    body: Option<&Value>,
) -> String {
    if let Some(body) = body {
        if let Some(message) = extract_error_message(mode, body) {
            return message;
        }
    }
    format!("{} {}", status, reason)
}

fn extract_error_message(mode: CompatMode, body: &Value) -> Option<String> {
    let error = match mode {
        // Google batch endpoints wrap the error object in a one-element array
        CompatMode::GoogleGenerative => body.get("error").or_else(|| body.get(0)?.get("error")),
        CompatMode::OpenAiLike | CompatMode::AnthropicMessages => body.get("error"),
    };

    if let Some(error) = error {
        // {"error": "plain string"}
        if let Some(s) = error.as_str() {
            return Some(s.to_string());
        }
        if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
            // Anthropic carries a useful error type alongside the message
            if mode == CompatMode::AnthropicMessages {
                if let Some(kind) = error.get("type").and_then(|t| t.as_str()) {
                    return Some(format!("{}: {}", kind, message));
                }
            }
            return Some(message.to_string());
        }
    }

    body.get("message")
        .and_then(|m| m.as_str())
        .map(|s| s.to_string())
}
