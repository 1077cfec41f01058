//! Cryptographic primitives for Scaleboard.
//!
//! Provides AES-256-GCM authenticated encryption of the stored upstream API
//! key, HKDF-SHA256 derivation of the encryption key from the configured
//! session secret, and zeroize-on-drop newtypes for both secrets.
//!
//! # Security model
//!
//! - Every encryption generates a fresh 96-bit nonce via `OsRng`.
//! - Binary format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`,
//!   base64-encoded when stored as a string.
//! - The session secret is never used as a key directly; it is stretched into
//!   a 256-bit key with HKDF-SHA256 under a fixed, versioned `info` label.
//! - Secret newtypes derive `Zeroize` + `ZeroizeOnDrop` and redact `Debug`.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Minimum ciphertext length: 12-byte nonce + 16-byte AES-GCM tag.
const MIN_CIPHERTEXT_LEN: usize = 12 + 16;

/// Nonce length for AES-256-GCM (96 bits).
const NONCE_LEN: usize = 12;

/// HKDF salt for deriving the credential key from the session secret.
const CREDENTIAL_KEY_SALT: &[u8] = b"scaleboard-credential-store";

/// HKDF info label. Bump the version if the record encryption scheme changes.
const CREDENTIAL_KEY_INFO: &[u8] = b"scaleboard-api-key-v1";

/// A 256-bit encryption key that is zeroized on drop.
///
/// The inner bytes are never exposed in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// A random key, for tests that need one unrelated to any secret.
    #[cfg(test)]
    pub(crate) fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Derive the credential encryption key from the configured session secret.
    ///
    /// Deterministic: the same secret always yields the same key, which is
    /// what lets a restarted process read the record it wrote earlier.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if HKDF expansion fails.
    pub fn from_session_secret(secret: &str) -> Result<Self, CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(CREDENTIAL_KEY_SALT), secret.as_bytes());
        let mut derived = [0u8; 32];
        hk.expand(CREDENTIAL_KEY_INFO, &mut derived)
            .map_err(|e| CryptoError::KeyDerivation {
                context: String::from_utf8_lossy(CREDENTIAL_KEY_INFO).into_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self(derived))
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care; the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An upstream API key held in memory.
///
/// Zeroized on drop and redacted in `Debug`. The plaintext is only reachable
/// through [`ApiKey::expose`], which the upstream client calls to build its
/// `Authorization` header.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a plaintext key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the plaintext key.
    ///
    /// Use with care; the caller must not log, persist, or return it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// A short, non-secret prefix that identifies the key in the UI.
    ///
    /// Takes the segment before the first `.` (Headscale keys are
    /// `<prefix>.<secret>`) and never returns more than half of the key, so
    /// the result is always a strict prefix of the plaintext. This is a
    /// display aid, not a security control.
    #[must_use]
    pub fn display_prefix(&self) -> String {
        let key = self.0.as_str();
        let segment = key.split_once('.').map_or(key, |(head, _)| head);
        let max = key.chars().count() / 2;
        segment.chars().take(max).collect()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// Encrypt plaintext using AES-256-GCM with a fresh random nonce.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut combined = Vec::with_capacity(NONCE_LEN.saturating_add(ciphertext.len()));
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt ciphertext produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if the input is shorter than
/// 28 bytes, and [`CryptoError::Decryption`] if authentication fails (wrong
/// key, corrupted data, or tampered tag).
pub fn decrypt(key: &EncryptionKey, combined: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if combined.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            expected: MIN_CIPHERTEXT_LEN,
            actual: combined.len(),
        });
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Decryption {
            reason: e.to_string(),
        })
}

/// Encrypt an API key into the base64 string stored in the settings record.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn seal_api_key(key: &EncryptionKey, api_key: &ApiKey) -> Result<String, CryptoError> {
    let combined = encrypt(key, api_key.expose().as_bytes())?;
    Ok(STANDARD.encode(combined))
}

/// Decrypt a base64 string produced by [`seal_api_key`].
///
/// # Errors
///
/// Returns [`CryptoError::Encoding`] for invalid base64, the errors of
/// [`decrypt`] for bad ciphertext, and [`CryptoError::InvalidUtf8`] if the
/// plaintext is not text.
pub fn open_api_key(key: &EncryptionKey, sealed: &str) -> Result<ApiKey, CryptoError> {
    let combined = STANDARD
        .decode(sealed.trim())
        .map_err(|_| CryptoError::Encoding)?;
    let plaintext = decrypt(key, &combined)?;
    let text = String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)?;
    Ok(ApiKey::new(text))
}
