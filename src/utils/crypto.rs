//! Credential encryption at rest
//!
//! API keys are encrypted per provider before they reach the persistent
//! config blob. Keys are derived with PBKDF2-HMAC-SHA256 over a fixed
//! passphrase and the provider's own 16-byte salt, so a value encrypted for
//! one provider cannot be decrypted under another provider's key.
//!
//! Stored format: base64(nonce || ciphertext || tag).

use crate::utils::error::{GatewayError, Result};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;

/// AES-256-GCM nonce size (96 bits / 12 bytes as recommended by NIST)
const AES_GCM_NONCE_SIZE: usize = 12;

/// PBKDF2 iteration count
const PBKDF2_ROUNDS: u32 = 100_000;

/// Fixed passphrase; secrecy comes from the per-provider salt separation and
/// the authenticated cipher, not from this value.
const KEY_PASSPHRASE: &[u8] = b"parsegate-credential-store";

/// Derive a 256-bit AES key for one provider salt
fn derive_key(salt: &[u8; 16]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(KEY_PASSPHRASE, salt, PBKDF2_ROUNDS, &mut key);
    key
}

/// Memoized key derivation, one derived key per provider id.
///
/// PBKDF2 at 100k rounds is deliberately slow; the cache keeps config
/// load/save from re-deriving on every call. Owned by the config store and
/// passed by reference, never a module global.
#[derive(Debug, Default)]
pub struct KeyCache {
    keys: RwLock<HashMap<String, [u8; 32]>>,
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive (or fetch the memoized) key for a provider salt
    pub fn key_for(&self, provider_id: &str, salt: &[u8; 16]) -> [u8; 32] {
        if let Some(key) = self.keys.read().get(provider_id) {
            return *key;
        }
        let key = derive_key(salt);
        self.keys.write().insert(provider_id.to_string(), key);
        key
    }
}

/// Encrypt a plaintext API key under a derived key.
///
/// A fresh random nonce is generated per call, so encrypting the same value
/// twice yields different ciphertexts.
pub fn encrypt_with_key(key: &[u8; 32], plaintext: &str) -> Result<String> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(cipher_key);

    let mut nonce_bytes = [0u8; AES_GCM_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| GatewayError::Crypto(format!("Encryption failed: {}", e)))?;

    let mut output = Vec::with_capacity(AES_GCM_NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);

    Ok(general_purpose::STANDARD.encode(&output))
}

/// Decrypt a stored API key under a derived key.
///
/// Returns `None` on any failure (corrupt data, truncated value, wrong salt).
/// A corrupted credential must degrade to "no key configured", never crash a
/// config load.
pub fn decrypt_with_key(key: &[u8; 32], stored: &str) -> Option<String> {
    let encrypted_bytes = general_purpose::STANDARD.decode(stored).ok()?;

    // Minimum: nonce + 16-byte auth tag
    if encrypted_bytes.len() < AES_GCM_NONCE_SIZE + 16 {
        return None;
    }

    let cipher_key = Key::<Aes256Gcm>::from_slice(key);
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Nonce::from_slice(&encrypted_bytes[..AES_GCM_NONCE_SIZE]);
    let ciphertext = &encrypted_bytes[AES_GCM_NONCE_SIZE..];

    let plaintext = cipher.decrypt(nonce, ciphertext).ok()?;
    String::from_utf8(plaintext).ok()
}
