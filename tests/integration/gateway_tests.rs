//! Gateway orchestration tests over mock provider endpoints
//!
//! Covers fallback ordering, retry budgets, health bookkeeping, credential
//! tests, and the dynamic-parsing retry loop.

use crate::common::{
    anthropic_completion, fast_policy, gateway_with, google_completion, init_tracing, mock_state,
    openai_completion,
};
use parsegate::{Config, GatewayError, HealthStatus, ProviderSettings};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOGLE_PATH: &str = "/models/gemini-2.0-flash:generateContent";
const OPENAI_PATH: &str = "/chat/completions";
const ANTHROPIC_PATH: &str = "/messages";

#[tokio::test]
async fn test_fallback_ordering_skips_unkeyed_and_never_duplicates() {
    init_tracing();
    let server = MockServer::start().await;

    // Active provider fails hard on every attempt
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "upstream exploded"}
        })))
        .expect(3) // exactly the provider's retry budget, no duplicates
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(google_completion(r#"{"Front": "q", "Back": "a"}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Anthropic has no key, so it must never be attempted
    Mock::given(method("POST"))
        .and(path(ANTHROPIC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_completion("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.provider = "openai".to_string();
    config.fallback_order = vec!["anthropic".to_string()];
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(3)));
    config
        .models
        .insert("google".into(), mock_state("sk-g", &server.uri(), fast_policy(3)));

    let gateway = gateway_with(&config).await;
    let result = gateway.parse_with_fallback("ephemeral", None).await.unwrap();

    assert_eq!(result["Front"], "q");
    assert_eq!(result["Back"], "a");
}

#[tokio::test]
async fn test_google_failure_falls_back_to_openai_with_health_bookkeeping() {
    init_tracing();
    let server = MockServer::start().await;

    // First three calls hit google and fail; the fourth call in the chain is
    // openai's and succeeds.
    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "backend error"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .and(header("authorization", "Bearer sk-o"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_completion(r#"{"Front": "from openai"}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.provider = "google".to_string();
    config
        .models
        .insert("google".into(), mock_state("sk-g", &server.uri(), fast_policy(3)));
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(3)));

    let gateway = gateway_with(&config).await;
    let result = gateway.parse_with_fallback("ephemeral", None).await.unwrap();
    assert_eq!(result["Front"], "from openai");

    let google = gateway.provider_health("google").await.unwrap().unwrap();
    assert_eq!(google.status, HealthStatus::Error);
    assert!(google.last_error.contains("failed"), "got: {}", google.last_error);
    assert!(google.last_checked.is_some());

    let openai = gateway.provider_health("openai").await.unwrap().unwrap();
    assert_eq!(openai.status, HealthStatus::Healthy);
    assert_eq!(openai.last_error, "");
}

#[tokio::test]
async fn test_exhaustion_surfaces_last_failure_only() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "google down"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"message": "openai down"}
        })))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.provider = "google".to_string();
    config
        .models
        .insert("google".into(), mock_state("sk-g", &server.uri(), fast_policy(1)));
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;
    let err = gateway.parse_with_fallback("ephemeral", None).await.unwrap_err();

    // openai failed last; its message is the one surfaced
    match err {
        GatewayError::AllProvidersFailed(message) => {
            assert!(message.contains("openai down"), "got: {}", message);
            assert!(!message.contains("google down"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The earlier failure is still in persisted health state
    let google = gateway.provider_health("google").await.unwrap().unwrap();
    assert!(google.last_error.contains("google down"));
}

#[tokio::test]
async fn test_fenced_output_is_stripped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(google_completion(
            "```json\n{\"Front\": \"fenced\"}\n```",
        )))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config
        .models
        .insert("google".into(), mock_state("sk-g", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;
    let result = gateway.parse_with_fallback("ephemeral", None).await.unwrap();
    assert_eq!(result["Front"], "fenced");
}

#[tokio::test]
async fn test_dynamic_parsing_retries_on_disallowed_fields() {
    let server = MockServer::start().await;

    // First response carries a stray key; the driver must retry
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(
            r#"{"Front": "x", "Unexpected": "y"}"#,
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(
            r#"{"Front": "clean", "Back": "also clean"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.provider = "openai".to_string();
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;
    let fields = vec!["Front".to_string(), "Back".to_string()];
    let result = gateway
        .parse_with_dynamic_fields("ephemeral", &fields, None)
        .await
        .unwrap();

    assert_eq!(result["Front"], "clean");
    assert_eq!(result["Back"], "also clean");
}

#[tokio::test]
async fn test_dynamic_parsing_rejects_all_empty_output() {
    let server = MockServer::start().await;

    // Valid JSON, allowed fields, but nothing usable in any of them
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_completion(
            r#"{"Front": "", "Back": ""}"#,
        )))
        .expect(2) // retried up to the driver's budget, then rejected
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.provider = "openai".to_string();
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;
    let fields = vec!["Front".to_string(), "Back".to_string()];
    let err = gateway
        .parse_with_dynamic_fields("ephemeral", &fields, None)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn test_connection_success_and_failure_update_health() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ANTHROPIC_PATH))
        .and(header("x-api-key", "good-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_completion("OK")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ANTHROPIC_PATH))
        .and(header("x-api-key", "bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config
        .models
        .insert("anthropic".into(), mock_state("unused", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;

    let ok = gateway.test_connection("anthropic", "good-key", None).await;
    assert!(ok.success, "got: {}", ok.message);
    let health = gateway.provider_health("anthropic").await.unwrap().unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);

    let bad = gateway.test_connection("anthropic", "bad-key", None).await;
    assert!(!bad.success);
    assert!(bad.message.contains("invalid x-api-key"), "got: {}", bad.message);
    let health = gateway.provider_health("anthropic").await.unwrap().unwrap();
    assert_eq!(health.status, HealthStatus::Error);
}

#[tokio::test]
async fn test_connection_rejects_unknown_provider_and_empty_key() {
    let gateway = gateway_with(&Config::default()).await;

    let result = gateway.test_connection("cohere", "key", None).await;
    assert!(!result.success);
    assert!(result.message.contains("Unknown provider"));

    let result = gateway.test_connection("openai", "  ", None).await;
    assert!(!result.success);
    assert!(result.message.contains("API key"));
}

#[tokio::test]
async fn test_call_provider_api_is_single_shot() {
    let server = MockServer::start().await;

    // No retry: a failing endpoint is hit exactly once
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "down"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(5)));

    let gateway = gateway_with(&config).await;
    let err = gateway
        .call_provider_api("openai", "sk-o", "gpt-4o-mini", "hello", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("down"));
}

#[tokio::test]
async fn test_call_provider_api_returns_raw_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_completion("plain text answer")),
        )
        .mount(&server)
        .await;

    let mut config = Config::default();
    config
        .models
        .insert("openai".into(), mock_state("sk-o", &server.uri(), fast_policy(1)));

    let gateway = gateway_with(&config).await;
    let text = gateway
        .call_provider_api("openai", "sk-o", "gpt-4o-mini", "hello", None)
        .await
        .unwrap();
    assert_eq!(text, "plain text answer");
}

#[tokio::test]
async fn test_update_settings_then_parse_uses_new_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .and(header("authorization", "Bearer rotated-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openai_completion(r#"{"Front": "ok"}"#)),
        )
        .mount(&server)
        .await;

    let gateway = gateway_with(&Config::default()).await;
    gateway.set_active_provider("openai").await.unwrap();
    gateway
        .update_provider_settings(
            "openai",
            ProviderSettings {
                api_key: Some("rotated-key".to_string()),
                api_url: Some(server.uri()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = gateway.parse_with_fallback("ephemeral", None).await.unwrap();
    assert_eq!(result["Front"], "ok");
}
