//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use lockbox_crypto::{KdfParams, KeyBackend, SoftwareBackend, DEFAULT_RSA_BITS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MIN_RSA_BITS: usize = 2048;
const MAX_RSA_BITS: usize = 8192;

/// Configuration for the key manager and encryption engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    /// Largest plaintext accepted by `encrypt`, in bytes.
    pub max_upload_bytes: usize,

    /// Age after which an Active key record is rotated.
    pub rotation_days: u32,

    /// Period of the background rotation task (seconds).
    pub rotation_interval_secs: u64,

    /// Modulus size for newly provisioned user key pairs.
    pub rsa_bits: usize,

    /// Argon2id parameters for protecting user private keys.
    pub kdf: KdfParams,

    /// Key backend name. Only `software` is built in.
    pub key_backend: String,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100_000_000,
            rotation_days: 90,
            rotation_interval_secs: 3600,
            rsa_bits: DEFAULT_RSA_BITS,
            kdf: KdfParams::default(),
            key_backend: "software".to_string(),
        }
    }
}

impl LockboxConfig {
    /// Defaults with a cheap KDF. For tests only.
    pub fn fast_kdf() -> Self {
        Self {
            kdf: KdfParams::insecure_fast(),
            ..Self::default()
        }
    }

    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_upload_bytes == 0 {
            return Err(EngineError::Config("max_upload_bytes must be positive".into()));
        }
        if self.rotation_days == 0 {
            return Err(EngineError::Config("rotation_days must be positive".into()));
        }
        if self.rotation_interval_secs == 0 {
            return Err(EngineError::Config(
                "rotation_interval_secs must be positive".into(),
            ));
        }
        if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&self.rsa_bits) || self.rsa_bits % 8 != 0 {
            return Err(EngineError::Config(format!(
                "rsa_bits must be a multiple of 8 between {MIN_RSA_BITS} and {MAX_RSA_BITS}, got {}",
                self.rsa_bits
            )));
        }
        self.kdf
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        self.backend().map(|_| ())
    }

    pub fn rotation_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.rotation_days))
    }

    pub fn rotation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rotation_interval_secs)
    }

    /// Instantiates the configured key backend.
    pub fn backend(&self) -> EngineResult<Arc<dyn KeyBackend>> {
        match self.key_backend.as_str() {
            "software" => Ok(Arc::new(SoftwareBackend)),
            other => Err(EngineError::Config(format!("unknown key backend: {other}"))),
        }
    }
}
