//! Config schema migration
//!
//! On a version mismatch the store builds a fresh default config and merges
//! the old blob's values into it field by field. Legacy provider ids are
//! canonicalized through the registry alias table before merging; providers
//! the old blob never knew about get fresh default state. Migration is
//! idempotent: re-migrating a current config only re-stamps the version.

use serde_json::Value;
use tracing::{debug, warn};

use super::model::{Config, HealthStatus, ModelState};
use crate::core::providers::registry;
use crate::core::retry::RetryPolicy;

/// Top-level keys this subsystem owns; everything else is collaborator data
/// and passes through unmodified.
const OWNED_KEYS: &[&str] = &["version", "provider", "models", "fallbackOrder"];

/// Rebuild a current-version [`Config`] from an arbitrary older blob
pub fn migrate(old: &Value) -> Config {
    let mut config = Config::default();

    if let Some(id) = old.get("provider").and_then(Value::as_str) {
        let canonical = registry::canonical_id(id);
        if registry::provider(canonical).is_some() {
            config.provider = canonical.to_string();
        } else {
            warn!(provider = id, "dropping unregistered active provider during migration");
        }
    }

    if let Some(models) = old.get("models").and_then(Value::as_object) {
        for (id, state) in models {
            let canonical = registry::canonical_id(id);
            match config.models.get_mut(canonical) {
                Some(target) => merge_model_state(target, state),
                None => {
                    warn!(provider = %id, "dropping unregistered provider state during migration");
                }
            }
        }
    }

    if let Some(order) = old.get("fallbackOrder").and_then(Value::as_array) {
        config.fallback_order = order
            .iter()
            .filter_map(Value::as_str)
            .map(|id| registry::canonical_id(id).to_string())
            .collect();
    }

    if let Some(object) = old.as_object() {
        for (key, value) in object {
            if !OWNED_KEYS.contains(&key.as_str()) {
                config.extra.insert(key.clone(), value.clone());
            }
        }
    }

    // Filters unknown ids out of the order, dedups, and appends any
    // registry id the old blob was missing.
    config.normalize();

    let from_version = old.get("version").and_then(Value::as_u64);
    debug!(
        from = from_version,
        to = config.version as u64,
        "config migrated"
    );
    config
}

/// Merge one provider's old state onto its fresh default, field by field.
/// Absent or mistyped fields keep the default; unrecognized health values
/// coerce to `unknown`.
fn merge_model_state(state: &mut ModelState, old: &Value) {
    if let Some(key) = old.get("apiKey").and_then(Value::as_str) {
        state.api_key = key.to_string();
    }

    let model = old
        .get("model")
        .or_else(|| old.get("modelName"))
        .and_then(Value::as_str);
    if let Some(model) = model {
        if !model.trim().is_empty() {
            state.model = Some(model.to_string());
        }
    }

    let api_url = old
        .get("apiUrl")
        .or_else(|| old.get("baseUrl"))
        .and_then(Value::as_str);
    if let Some(url) = api_url {
        if !url.trim().is_empty() {
            state.api_url = Some(url.to_string());
        }
    }

    if let Some(status) = old.get("status") {
        state.status =
            serde_json::from_value::<HealthStatus>(status.clone()).unwrap_or_default();
    }

    if let Some(checked) = old.get("lastChecked").and_then(Value::as_i64) {
        state.last_checked = Some(checked);
    }

    if let Some(error) = old.get("lastError").and_then(Value::as_str) {
        state.last_error = error.to_string();
    }

    if let Some(policy) = old.get("retryPolicy") {
        state.retry_policy = serde_json::from_value::<RetryPolicy>(policy.clone()).ok();
    }
}
