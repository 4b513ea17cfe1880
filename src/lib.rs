//! # parsegate
//!
//! Structured text parsing over heterogeneous AI providers.
//!
//! A caller submits free-form text; the gateway translates one abstract
//! completion request into each provider's wire format, sequences attempts
//! across providers with bounded retry and fallback, validates the returned
//! JSON against a caller-supplied field schema, and keeps provider
//! credentials encrypted at rest in a versioned configuration blob.
//!
//! ## Features
//!
//! - **Multi-Provider**: three wire-format families (OpenAI-compatible,
//!   Google Generative Language, Anthropic Messages) behind one request shape
//! - **Retry & Fallback**: deterministic exponential backoff per provider,
//!   sequential cross-provider fallback with persisted health state
//! - **Field Schemas**: prompts bounded to a caller-supplied field list, with
//!   validated, retryable structured output
//! - **Encrypted Credentials**: per-provider PBKDF2-derived AES-GCM keys;
//!   plaintext API keys never reach storage
//! - **Versioned Config**: schema migration with legacy provider-id aliasing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parsegate::{ConfigStore, ParseGateway, ProviderSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ConfigStore::with_file("config.json");
//!     let gateway = ParseGateway::new(store)?;
//!
//!     gateway
//!         .update_provider_settings(
//!             "openai",
//!             ProviderSettings {
//!                 api_key: Some("sk-...".to_string()),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!
//!     let fields = vec!["Meaning".to_string(), "Example".to_string()];
//!     let result = gateway
//!         .parse_with_dynamic_fields("ephemeral", &fields, None)
//!         .await?;
//!     println!("{:#?}", result);
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export main types
pub use config::{
    CONFIG_VERSION, Config, ConfigStorage, ConfigStore, FileStorage, HealthStatus, MemoryStorage,
    ModelState,
};
pub use utils::error::{GatewayError, Result};

// Export the orchestration surface
pub use crate::core::gateway::{
    ConnectionTestResult, DEFAULT_FIELDS, ParseGateway, ProviderHealth, ProviderInfo,
    ProviderSettings,
};
pub use crate::core::providers::{
    CompatMode, CompletionOptions, ErrorKind, PROVIDERS, ProviderDescriptor, ProviderError,
};
pub use crate::core::retry::RetryPolicy;
pub use crate::core::schema::{ValidationReport, build_integrated_prompt, validate_ai_output};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
