//! Provider error type
//!
//! One structured error type for every provider attempt. Each variant carries
//! a machine-readable classification so callers (and the retry engine) never
//! have to re-derive the failure class from message text.

use thiserror::Error;

/// Errors produced while talking to one provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider cannot be attempted at all: unknown id, missing API key,
    /// missing model. Recorded against the provider, never retried.
    #[error("Configuration error for {provider}: {message}")]
    Configuration {
        provider: &'static str,
        message: String,
    },

    /// Transport-level failure before a status code was obtained
    #[error("Network error for {provider}: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    /// Non-2xx response; message comes from the provider's error parser
    #[error("Request to {provider} failed with status {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// A 2xx response whose body could not be parsed as JSON
    #[error("Serialization error for {provider}: {message}")]
    Serialization {
        provider: &'static str,
        message: String,
    },

    /// A well-formed response that carried no usable completion text
    #[error("Empty response from {provider}")]
    EmptyResponse { provider: &'static str },
}

/// Machine-readable failure class, stable across message wording changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Network,
    Api,
    Serialization,
    EmptyResponse,
}

impl ProviderError {
    /// Create a configuration error
    pub fn configuration(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Configuration {
            provider,
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Network {
            provider,
            message: message.into(),
        }
    }

    /// Create an API error
    pub fn api(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            provider,
            status,
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Serialization {
            provider,
            message: message.into(),
        }
    }

    /// Which provider this error belongs to
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Configuration { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Serialization { provider, .. }
            | ProviderError::EmptyResponse { provider } => provider,
        }
    }

    /// Failure classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Configuration { .. } => ErrorKind::Configuration,
            ProviderError::Network { .. } => ErrorKind::Network,
            ProviderError::Api { .. } => ErrorKind::Api,
            ProviderError::Serialization { .. } => ErrorKind::Serialization,
            ProviderError::EmptyResponse { .. } => ErrorKind::EmptyResponse,
        }
    }

    /// Whether the retry engine should attempt again.
    ///
    /// Transport-class failures (network, any HTTP status, unparsable success
    /// body, empty content) are retryable; configuration failures are fatal to
    /// the provider's attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Configuration { .. })
    }
}
