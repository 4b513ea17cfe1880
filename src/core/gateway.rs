//! Parse gateway
//!
//! The service object tying the subsystem together: it reads the encrypted
//! config store, sequences providers (active first, then the configured
//! fallback order, then the registry order), runs each attempt through the
//! retry engine, and persists per-provider health after every outcome.
//!
//! Providers are tried strictly one at a time. Sequential fallback is a
//! deliberate invariant: health-state writes for one call must not race each
//! other, so candidates are never raced concurrently.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::model::{Config, HealthStatus, ModelState};
use crate::config::store::ConfigStore;
use crate::core::providers::error::ProviderError;
use crate::core::providers::executor;
use crate::core::providers::registry::{self, ProviderDescriptor};
use crate::core::providers::request::{self, CompletionOptions, RequestParams};
use crate::core::retry::{RetryPolicy, run_with_retry};
use crate::core::schema::prompt::build_integrated_prompt;
use crate::core::schema::validator::validate_ai_value;
use crate::utils::error::{GatewayError, Result};

/// Fields requested by [`ParseGateway::parse_with_fallback`] when the caller
/// does not bring their own schema
pub const DEFAULT_FIELDS: &[&str] = &["Front", "Back"];

/// Minimum attempts of the dynamic-parsing driver, independent of the active
/// provider's transport retry policy
const DYNAMIC_RETRY_BUDGET: u32 = 2;

/// Outcome of a credential test against one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
}

/// Registry metadata exposed to host UI
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub default_model: &'static str,
    pub origins: &'static [&'static str],
}

/// Persisted health verdict for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_checked: Option<i64>,
    pub last_error: String,
}

/// User-facing patch for one provider's settings; `Some("")` clears a value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_url: Option<String>,
}

/// AI provider orchestration service
pub struct ParseGateway {
    store: ConfigStore,
    http: reqwest::Client,
    default_policy: RetryPolicy,
}

impl ParseGateway {
    /// Create a gateway over a config store.
    ///
    /// The HTTP client carries no request timeout of its own; timeout policy
    /// belongs to the host environment.
    pub fn new(store: ConfigStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(store, http))
    }

    /// Create a gateway with a caller-supplied HTTP client
    pub fn with_client(store: ConfigStore, http: reqwest::Client) -> Self {
        Self {
            store,
            http,
            default_policy: RetryPolicy::default(),
        }
    }

    /// The config store backing this gateway
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Parse free text into the default field set.
    ///
    /// `template` may carry the `{{text}}`/`{{schema}}` placeholders; a
    /// template with neither is treated as a fully custom instruction.
    pub async fn parse_with_fallback(
        &self,
        text: &str,
        template: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let fields: Vec<String> = DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect();
        let prompt = build_integrated_prompt(text, &fields, template);
        let value = self
            .complete_with_fallback(&prompt, CompletionOptions::default())
            .await?;
        value
            .as_object()
            .cloned()
            .ok_or_else(|| GatewayError::Validation("AI output is not a JSON object".to_string()))
    }

    /// Parse free text into a caller-supplied field schema, retrying with a
    /// slightly lower temperature when the output has wrong fields or no
    /// content.
    pub async fn parse_with_dynamic_fields(
        &self,
        text: &str,
        field_names: &[String],
        custom_template: Option<&str>,
    ) -> Result<Map<String, Value>> {
        if field_names.is_empty() {
            return Err(GatewayError::Validation(
                "at least one field name is required".to_string(),
            ));
        }
        if field_names.iter().any(|name| name.trim().is_empty()) {
            return Err(GatewayError::Validation(
                "field names must be non-empty".to_string(),
            ));
        }

        self.run_dynamic_parsing(text, field_names, custom_template)
            .await
    }

    /// Single-shot call against one provider, no fallback, no retry
    pub async fn call_provider_api(
        &self,
        provider_id: &str,
        api_key: &str,
        model: &str,
        prompt: &str,
        options: Option<CompletionOptions>,
    ) -> Result<String> {
        let descriptor = lookup(provider_id)?;
        if api_key.trim().is_empty() {
            return Err(ProviderError::configuration(descriptor.id, "API key is required").into());
        }

        let state = self.model_state(descriptor.id).await;
        let model = if model.trim().is_empty() {
            descriptor.default_model
        } else {
            model
        };

        let params = RequestParams {
            api_key,
            model,
            prompt,
            options: options.unwrap_or_default(),
            override_base_url: state.api_url.as_deref(),
        };
        let provider_request = request::build_request(descriptor, &params);
        let text = executor::execute(&self.http, descriptor, &provider_request).await?;
        Ok(text)
    }

    /// Test a credential against one provider, persisting the verdict as
    /// that provider's health state
    pub async fn test_connection(
        &self,
        provider_id: &str,
        api_key: &str,
        model: Option<&str>,
    ) -> ConnectionTestResult {
        let Ok(descriptor) = lookup(provider_id) else {
            return ConnectionTestResult {
                success: false,
                message: format!("Unknown provider: {}", provider_id),
            };
        };
        if api_key.trim().is_empty() {
            return ConnectionTestResult {
                success: false,
                message: "API key is required".to_string(),
            };
        }

        let state = self.model_state(descriptor.id).await;
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(descriptor.test_model);

        let params = RequestParams {
            api_key,
            model,
            prompt: "Reply with the single word: OK",
            options: CompletionOptions {
                temperature: 0.0,
                max_tokens: 16,
            },
            override_base_url: state.api_url.as_deref(),
        };
        let provider_request = request::build_request(descriptor, &params);

        match executor::execute(&self.http, descriptor, &provider_request).await {
            Ok(_) => {
                self.record_health(descriptor.id, HealthStatus::Healthy, String::new())
                    .await;
                ConnectionTestResult {
                    success: true,
                    message: "Connection successful".to_string(),
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.record_health(descriptor.id, HealthStatus::Error, message.clone())
                    .await;
                ConnectionTestResult {
                    success: false,
                    message,
                }
            }
        }
    }

    /// Registry metadata for host UI
    pub fn list_providers() -> Vec<ProviderInfo> {
        registry::PROVIDERS
            .iter()
            .map(|p| ProviderInfo {
                id: p.id,
                label: p.label,
                default_model: p.default_model,
                origins: p.origins,
            })
            .collect()
    }

    /// Persisted health verdict for one provider, if it is registered
    pub async fn provider_health(&self, provider_id: &str) -> Result<Option<ProviderHealth>> {
        let canonical = registry::canonical_id(provider_id);
        if registry::provider(canonical).is_none() {
            return Ok(None);
        }
        let config = self.store.load().await?;
        Ok(config.models.get(canonical).map(|state| ProviderHealth {
            status: state.status,
            last_checked: state.last_checked,
            last_error: state.last_error.clone(),
        }))
    }

    /// Make `provider_id` the provider tried first by the fallback sequencer
    pub async fn set_active_provider(&self, provider_id: &str) -> Result<()> {
        let descriptor = lookup(provider_id)?;
        self.store
            .update(|config| config.provider = descriptor.id.to_string())
            .await?;
        Ok(())
    }

    /// Patch one provider's stored settings; empty strings clear a value
    pub async fn update_provider_settings(
        &self,
        provider_id: &str,
        settings: ProviderSettings,
    ) -> Result<()> {
        let descriptor = lookup(provider_id)?;
        self.store
            .update(|config| {
                let state = config.models.entry(descriptor.id.to_string()).or_default();
                if let Some(api_key) = settings.api_key {
                    state.api_key = api_key;
                }
                if let Some(model) = settings.model {
                    state.model = (!model.trim().is_empty()).then_some(model);
                }
                if let Some(api_url) = settings.api_url {
                    state.api_url = (!api_url.trim().is_empty()).then_some(api_url);
                }
            })
            .await?;
        Ok(())
    }

    /// Run one prompt through the fallback chain and parse the completion
    /// text as JSON.
    ///
    /// The returned error carries only the most recent failure; earlier
    /// failures are persisted per provider and logged.
    async fn complete_with_fallback(
        &self,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<Value> {
        let config = self.store.load().await?;
        // Skips are recorded separately: the aggregate error quotes the most
        // recent *attempt* failure, never a skip.
        let mut last_failure: Option<String> = None;
        let mut skipped: Vec<String> = Vec::new();
        let mut attempted = false;

        for id in config.candidate_order() {
            let Some(descriptor) = registry::provider(&id) else {
                warn!(provider = %id, "skipping unregistered provider in fallback chain");
                skipped.push(format!("{}: unknown provider", id));
                continue;
            };
            let state = config.models.get(&id).cloned().unwrap_or_default();
            if !state.has_key() {
                debug!(provider = descriptor.id, "skipping provider without API key");
                skipped.push(format!("{}: no API key configured", id));
                continue;
            }

            attempted = true;
            let model = resolve_model(descriptor, &state);
            let policy = state.retry_policy.unwrap_or(self.default_policy);
            let params = RequestParams {
                api_key: &state.api_key,
                model: &model,
                prompt,
                options,
                override_base_url: state.api_url.as_deref(),
            };
            let provider_request = request::build_request(descriptor, &params);

            let outcome = run_with_retry(&policy, |_| {
                executor::execute(&self.http, descriptor, &provider_request)
            })
            .await;

            match outcome {
                Ok(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        info!(provider = descriptor.id, model = %model, "parse request succeeded");
                        self.record_health(descriptor.id, HealthStatus::Healthy, String::new())
                            .await;
                        return Ok(value);
                    }
                    Err(e) => {
                        let message = format!("Failed to parse AI output as JSON: {}", e);
                        warn!(provider = descriptor.id, error = %message, "falling back");
                        self.record_health(descriptor.id, HealthStatus::Error, message.clone())
                            .await;
                        last_failure = Some(message);
                    }
                },
                Err(err) => {
                    let message = err.to_string();
                    warn!(provider = descriptor.id, error = %message, "falling back");
                    self.record_health(descriptor.id, HealthStatus::Error, message.clone())
                        .await;
                    last_failure = Some(message);
                }
            }
        }

        if attempted {
            Err(GatewayError::AllProvidersFailed(
                last_failure.unwrap_or_default(),
            ))
        } else {
            Err(GatewayError::NoProvidersAvailable(format!(
                "no provider could be attempted ({})",
                skipped.join("; ")
            )))
        }
    }

    /// Dynamic-parsing driver: bounded retry around prompt build, fallback
    /// completion, and schema validation. Wrong-field and all-empty outputs
    /// are retryable here, distinct from transport retries below.
    async fn run_dynamic_parsing(
        &self,
        text: &str,
        field_names: &[String],
        custom_template: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let config = self.store.load().await?;
        let active_policy = config
            .models
            .get(&config.provider)
            .and_then(|state| state.retry_policy)
            .unwrap_or(self.default_policy);
        let budget = DYNAMIC_RETRY_BUDGET.max(active_policy.max_attempts.max(1));

        let mut last_failure: Option<GatewayError> = None;

        for attempt in 1..=budget {
            let temperature = (0.3 - 0.1 * (attempt - 1) as f32).max(0.1);
            let options = CompletionOptions {
                temperature,
                ..Default::default()
            };
            let prompt = build_integrated_prompt(text, field_names, custom_template);

            match self.complete_with_fallback(&prompt, options).await {
                Ok(value) => {
                    let report = validate_ai_value(&value, field_names);
                    if report.is_valid && report.has_content {
                        return Ok(report.fields);
                    }
                    let reason = if let Some(parse_error) = report.parse_error {
                        parse_error
                    } else if !report.is_valid {
                        format!(
                            "output contained disallowed fields: {}",
                            report.invalid_fields.join(", ")
                        )
                    } else {
                        "output contained no usable field content".to_string()
                    };
                    debug!(attempt, budget, reason = %reason, "dynamic parsing attempt rejected");
                    last_failure = Some(GatewayError::Validation(reason));
                }
                Err(err) if err.is_exhaustion() => {
                    debug!(attempt, budget, error = %err, "fallback chain exhausted, retrying");
                    last_failure = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_failure
            .unwrap_or_else(|| GatewayError::Validation("dynamic parsing made no attempts".to_string())))
    }

    /// Loads the stored state for one provider; defaults when absent
    async fn model_state(&self, provider_id: &str) -> ModelState {
        match self.store.load().await {
            Ok(config) => config.models.get(provider_id).cloned().unwrap_or_default(),
            Err(e) => {
                warn!(provider = provider_id, error = %e, "config load failed, using defaults");
                ModelState::default()
            }
        }
    }

    /// Persist one provider's health verdict. A persistence failure is
    /// logged but never fails the parse that produced the verdict.
    async fn record_health(&self, provider_id: &str, status: HealthStatus, message: String) {
        let now = chrono::Utc::now().timestamp_millis();
        let result = self
            .store
            .update(|config: &mut Config| {
                let state = config.models.entry(provider_id.to_string()).or_default();
                state.status = status;
                state.last_checked = Some(now);
                state.last_error = message;
            })
            .await;
        if let Err(e) = result {
            warn!(provider = provider_id, error = %e, "failed to persist provider health");
        }
    }
}

/// Resolve a public provider id to its descriptor
fn lookup(provider_id: &str) -> Result<&'static ProviderDescriptor> {
    let canonical = registry::canonical_id(provider_id);
    registry::provider(canonical).ok_or_else(|| {
        ProviderError::configuration("gateway", format!("Unknown provider: {}", provider_id)).into()
    })
}

/// Model resolution: explicit override, then the provider default, then the
/// provider's designated test model
fn resolve_model(descriptor: &ProviderDescriptor, state: &ModelState) -> String {
    if let Some(model) = state.model.as_deref() {
        if !model.trim().is_empty() {
            return model.to_string();
        }
    }
    if !descriptor.default_model.is_empty() {
        return descriptor.default_model.to_string();
    }
    descriptor.test_model.to_string()
}
