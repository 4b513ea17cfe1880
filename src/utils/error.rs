//! Error handling for the gateway
//!
//! This module defines the crate-level error type. Provider-level errors live
//! in [`crate::core::providers::error`] and convert into `GatewayError` at the
//! orchestration boundary.

use crate::core::providers::error::ProviderError;
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Validation errors (AI output did not match the requested field schema)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Crypto errors
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// No provider in the fallback chain could even be attempted
    #[error("No providers available: {0}")]
    NoProvidersAvailable(String),

    /// Every candidate provider was attempted and failed
    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),
}

impl GatewayError {
    /// True when this error means the whole fallback chain was exhausted.
    ///
    /// The message carries only the *last* failure; earlier failures are in
    /// the persisted per-provider health state.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            GatewayError::AllProvidersFailed(_) | GatewayError::NoProvidersAvailable(_)
        )
    }
}
