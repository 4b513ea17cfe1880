//! Provider registry
//!
//! Static catalog of every provider this gateway can talk to. Descriptors are
//! defined at process start and never mutated; everything else (keys, model
//! overrides, health) lives in the config blob keyed by descriptor id.

use serde::Serialize;

/// Wire-format family of a provider's API.
///
/// Dispatch on this enum selects the request builder and the response/error
/// parsers. A closed enum means an unknown mode cannot exist, so nothing ever
/// falls through to a default wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompatMode {
    /// `POST {base}/chat/completions` with a Bearer token
    OpenAiLike,
    /// `POST {base}/models/{model}:generateContent` with `x-goog-api-key`
    GoogleGenerative,
    /// `POST {base}/messages` with `x-api-key` and a pinned API version
    AnthropicMessages,
}

/// Immutable description of one provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderDescriptor {
    /// Canonical id, used as the config key
    pub id: &'static str,
    /// Human-readable label for host UI
    pub label: &'static str,
    /// Wire-format family
    pub mode: CompatMode,
    /// Model used when the config carries no override
    pub default_model: &'static str,
    /// Cheap model used by connection tests
    pub test_model: &'static str,
    /// Default API base URL
    pub base_url: &'static str,
    /// Salt for the provider's credential-encryption key
    pub key_salt: [u8; 16],
    /// Network origins the host environment must permit
    pub origins: &'static [&'static str],
}

/// Registry in built-in fallback order
pub static PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        id: "google",
        label: "Google Gemini",
        mode: CompatMode::GoogleGenerative,
        default_model: "gemini-2.0-flash",
        test_model: "gemini-2.0-flash-lite",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        key_salt: *b"pg.salt.google.1",
        origins: &["https://generativelanguage.googleapis.com/*"],
    },
    ProviderDescriptor {
        id: "openai",
        label: "OpenAI",
        mode: CompatMode::OpenAiLike,
        default_model: "gpt-4o-mini",
        test_model: "gpt-4o-mini",
        base_url: "https://api.openai.com/v1",
        key_salt: *b"pg.salt.openai.1",
        origins: &["https://api.openai.com/*"],
    },
    ProviderDescriptor {
        id: "anthropic",
        label: "Anthropic Claude",
        mode: CompatMode::AnthropicMessages,
        default_model: "claude-3-5-sonnet-20241022",
        test_model: "claude-3-5-haiku-20241022",
        base_url: "https://api.anthropic.com/v1",
        key_salt: *b"pg.salt.anthro.1",
        origins: &["https://api.anthropic.com/*"],
    },
];

/// Look up a descriptor by canonical id
pub fn provider(id: &str) -> Option<&'static ProviderDescriptor> {
    PROVIDERS.iter().find(|p| p.id == id)
}

/// Registry ids in built-in order
pub fn default_order() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.id).collect()
}

/// Map a historical provider id to its canonical form.
///
/// Older config blobs used these aliases; migration funnels every stored id
/// through here before merging. Unrecognized ids pass through unchanged and
/// are filtered against the registry by the caller.
pub fn canonical_id(id: &str) -> &str {
    match id {
        "gemini" | "google-ai" | "googleai" => "google",
        "claude" => "anthropic",
        "gpt" | "chatgpt" => "openai",
        other => other,
    }
}
