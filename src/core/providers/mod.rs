//! AI provider translation layer
//!
//! A static registry of provider descriptors, a pure request builder with
//! response/error parsers per wire-format family, and the executor that
//! performs one HTTP call and normalizes the outcome.

pub mod error;
pub mod executor;
pub mod registry;
pub mod request;

pub use error::{ErrorKind, ProviderError};
pub use registry::{CompatMode, PROVIDERS, ProviderDescriptor};
pub use request::{CompletionOptions, ProviderRequest, RequestParams};
