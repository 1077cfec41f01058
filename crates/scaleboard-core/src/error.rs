//! Error types for `scaleboard-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. No variant ever includes key material: not the API key, not
//! the session secret, not the ciphertext.

use scaleboard_storage::StorageError;

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// AES-256-GCM decryption failed (wrong key, corrupted ciphertext, or tampered tag).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// HKDF key derivation failed.
    #[error("key derivation failed for context '{context}': {reason}")]
    KeyDerivation { context: String, reason: String },

    /// Ciphertext is too short to contain a valid nonce + tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },

    /// The stored ciphertext is not valid base64.
    #[error("ciphertext is not valid base64")]
    Encoding,

    /// The decrypted bytes are not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from the credential store.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The storage location is unusable at boot. Fatal: the process must not start.
    #[error("credential storage initialization failed: {reason}")]
    StorageInit { reason: String },

    /// The persisted record holds no API key at all.
    #[error("no API key is stored")]
    MissingKey,

    /// A key is stored but cannot be decrypted with the current session secret.
    #[error("stored API key could not be decrypted (session secret changed or record corrupted)")]
    Decryption(#[source] CryptoError),

    /// Encrypting a new API key failed.
    #[error("API key encryption failed: {0}")]
    Encryption(#[source] CryptoError),

    /// The record could not be serialized for persistence.
    #[error("credential record serialization failed: {reason}")]
    Serialization { reason: String },

    /// The underlying storage backend returned an error.
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from upstream calls and provider operations.
///
/// Every provider method returns `Result<_, UpstreamError>`; the variant
/// decides the HTTP status the route layer answers with.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// The request was rejected locally before any network call.
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    /// The upstream host could not be reached (DNS, connection refused, TLS).
    #[error("upstream unreachable: {reason}")]
    Unreachable { reason: String },

    /// The call did not complete within the client timeout.
    #[error("upstream request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The upstream answered 2xx but the body was not valid JSON.
    #[error("upstream returned an unreadable response ({status}): {reason}")]
    InvalidResponse { status: u16, reason: String },

    /// The active provider does not implement this operation.
    #[error("{operation} is not available with the {provider} provider")]
    NotImplemented {
        provider: &'static str,
        operation: &'static str,
    },
}

/// Synthetic status for a timed-out upstream call.
pub const TIMEOUT_STATUS: u16 = 504;

impl UpstreamError {
    /// HTTP status code to surface for this failure.
    ///
    /// Upstream rejections keep the upstream's own status; failures without
    /// a response map to 500, timeouts to 504.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unreachable { .. } | Self::InvalidResponse { .. } => 500,
            Self::Timeout { .. } => TIMEOUT_STATUS,
            Self::Rejected { status, .. } => *status,
            Self::NotImplemented { .. } => 501,
        }
    }
}

/// Errors from parsing human-readable expiration durations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// The input does not match `<digits><unit>`.
    #[error("invalid duration '{input}': expected a number followed by s, h, d, m or y (e.g. 48h, 7d, 90d, 6m, 1y)")]
    Invalid { input: String },

    /// The duration overflows the supported time range.
    #[error("duration '{input}' is too large")]
    Overflow { input: String },
}

/// Errors from validating preference updates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    /// Unsupported UI language.
    #[error("unsupported language '{value}', expected one of: fr, en, es, ja, zh")]
    InvalidLanguage { value: String },

    /// Unsupported UI theme.
    #[error("unsupported theme '{value}', expected one of: dark, light, green")]
    InvalidTheme { value: String },

    /// The logo is not a `data:image/...` URI.
    #[error("logo must be a base64 encoded image (data:image/...)")]
    InvalidLogoFormat,

    /// The decoded logo exceeds the size cap.
    #[error("logo is {size} bytes, maximum is {max} bytes")]
    LogoTooLarge { size: usize, max: usize },
}

impl PreferenceError {
    /// Machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidLanguage { .. } => "invalid_language",
            Self::InvalidTheme { .. } => "invalid_theme",
            Self::InvalidLogoFormat => "invalid_logo_format",
            Self::LogoTooLarge { .. } => "logo_too_large",
        }
    }
}

/// Errors from the settings service.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The candidate URL is not an absolute HTTP/HTTPS URL.
    #[error("invalid URL format: {reason}")]
    InvalidUrl { reason: String },

    /// The candidate API key is empty.
    #[error("API key is required")]
    MissingApiKey,

    /// The connectivity probe against the candidate credentials failed.
    #[error("connection test failed: {reason}")]
    ConnectionFailed { reason: String },

    /// The credential store failed.
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// The configured provider selector is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{value}', expected 'api' or 'docker'")]
pub struct UnknownProvider {
    pub value: String,
}
