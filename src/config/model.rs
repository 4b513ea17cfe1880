//! Configuration data model
//!
//! The persistent blob is one schema-versioned JSON document. Provider API
//! keys inside it are ciphertext at rest; every other field is plaintext.
//! Sections owned by collaborators (templates, UI prefs) ride along in
//! `extra` untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::providers::registry;
use crate::core::retry::RetryPolicy;

/// Current config schema version
pub const CONFIG_VERSION: u32 = 3;

/// Cached verdict from the most recent attempt against a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Error,
    /// Also the landing spot for any unrecognized stored value
    #[default]
    #[serde(other)]
    Unknown,
}

/// Per-provider mutable state inside the config blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelState {
    /// Ciphertext on disk; plaintext in memory after a successful load
    pub api_key: String,
    /// Model override; empty/absent means the registry default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Base-URL override (proxy or compatible endpoint)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Health verdict from the last attempt
    pub status: HealthStatus,
    /// Epoch millis of the last health change
    pub last_checked: Option<i64>,
    /// Message of the last failure; empty after a success
    pub last_error: String,
    /// Retry override; absent means the system default policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

impl ModelState {
    /// True when a usable API key is configured
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Root configuration object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Schema version; a mismatch on load triggers migration
    pub version: u32,
    /// Active provider id, tried first by the fallback sequencer
    pub provider: String,
    /// Per-provider state keyed by canonical id
    pub models: BTreeMap<String, ModelState>,
    /// Providers to try after the active one, in order
    pub fallback_order: Vec<String>,
    /// Collaborator-owned sections, passed through unmodified
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        let models = registry::PROVIDERS
            .iter()
            .map(|p| (p.id.to_string(), ModelState::default()))
            .collect();
        Self {
            version: CONFIG_VERSION,
            provider: registry::PROVIDERS[0].id.to_string(),
            models,
            fallback_order: registry::default_order()
                .into_iter()
                .map(String::from)
                .collect(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Config {
    /// Restore the structural invariants after load or caller mutation:
    /// every registered provider has a model state, `fallback_order` is
    /// deduplicated and registry-complete, and the active id is registered.
    pub fn normalize(&mut self) {
        for descriptor in registry::PROVIDERS {
            self.models
                .entry(descriptor.id.to_string())
                .or_default();
        }

        let mut order: Vec<String> = Vec::with_capacity(registry::PROVIDERS.len());
        for id in &self.fallback_order {
            let id = registry::canonical_id(id);
            if registry::provider(id).is_some() && !order.iter().any(|seen| seen == id) {
                order.push(id.to_string());
            }
        }
        for id in registry::default_order() {
            if !order.iter().any(|seen| seen == id) {
                order.push(id.to_string());
            }
        }
        self.fallback_order = order;

        let canonical = registry::canonical_id(&self.provider).to_string();
        self.provider = if registry::provider(&canonical).is_some() {
            canonical
        } else {
            registry::PROVIDERS[0].id.to_string()
        };
    }

    /// Candidate providers in fallback order: active id first, then the
    /// configured order, then the registry order; first occurrence wins.
    pub fn candidate_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(registry::PROVIDERS.len() + 1);
        let mut push = |id: &str, order: &mut Vec<String>| {
            if !order.iter().any(|seen| seen == id) {
                order.push(id.to_string());
            }
        };

        push(&self.provider, &mut order);
        for id in &self.fallback_order {
            push(id, &mut order);
        }
        for id in registry::default_order() {
            push(id, &mut order);
        }
        order
    }
}
