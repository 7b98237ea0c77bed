//! Engine error taxonomy.

use lockbox_crypto::CryptoError;
use lockbox_types::{KeyId, KeyStatus, StoreError};
use thiserror::Error;
use tracing::debug;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to callers of the engine.
///
/// `CryptoFailure` carries no detail on purpose: which step of an unwrap
/// or cipher operation failed is only ever logged, never returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed key material: {0}")]
    KeyFormat(String),

    #[error("cryptographic operation failed")]
    CryptoFailure,

    #[error("integrity check failed: {0}")]
    IntegrityFailure(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("key {key_id} cannot move from {from} to {to}")]
    InvalidTransition {
        key_id: KeyId,
        from: KeyStatus,
        to: KeyStatus,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::Conflict(msg) | StoreError::Backend(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<CryptoError> for EngineError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyFormat(msg) => EngineError::KeyFormat(msg),
            other => {
                debug!(error = %other, "crypto failure");
                EngineError::CryptoFailure
            }
        }
    }
}
