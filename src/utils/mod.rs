//! Utility modules for the gateway
//!
//! - **crypto**: credential encryption at rest (key derivation, AES-GCM)
//! - **error**: error handling

pub mod crypto;
pub mod error;
