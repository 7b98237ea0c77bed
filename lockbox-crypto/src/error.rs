//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors from the cryptographic primitives.
///
/// Messages never contain key material or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed key material: {0}")]
    KeyFormat(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("malformed protected blob: {0}")]
    MalformedBlob(String),
}

impl CryptoError {
    /// True for failures caused by unparseable key material, as opposed to
    /// cipher-level failures.
    pub fn is_key_format(&self) -> bool {
        matches!(self, CryptoError::KeyFormat(_))
    }
}
