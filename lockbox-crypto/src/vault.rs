//! Secret-protected storage of user private keys.
//!
//! A 256-bit key is derived from the user's secret with Argon2id and a fresh
//! random salt, then the PKCS#8 private key is sealed with AES-256-GCM. The
//! blob carries everything but the secret:
//!
//! ```text
//! [ version: 1 ][ memory_kib: u32 BE ][ iterations: u32 BE ][ parallelism: u32 BE ]
//! [ salt: 16 ][ nonce: 12 ][ ciphertext + tag ]
//! ```
//!
//! Recording the KDF parameters in the blob keeps old blobs readable after
//! the configured defaults change.

use crate::error::{CryptoError, CryptoResult};
use crate::wrap::PrivateKey;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const DERIVED_KEY_SIZE: usize = 32;
const BLOB_VERSION: u8 = 1;
const HEADER_SIZE: usize = 1 + 4 * 3 + SALT_SIZE + NONCE_SIZE;

// Upper bounds on parameters read back from a blob.
const MAX_MEMORY_KIB: u32 = 1 << 21;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use for real secrets.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations == 0
            || self.iterations > MAX_ITERATIONS
            || self.parallelism == 0
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::KeyDerivation(format!(
                "KDF parameters out of range: {self:?}"
            )));
        }
        self.argon2().map(|_| ())
    }

    fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(DERIVED_KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn derive(&self, secret: &[u8], salt: &[u8]) -> CryptoResult<Zeroizing<[u8; DERIVED_KEY_SIZE]>> {
        let mut out = Zeroizing::new([0u8; DERIVED_KEY_SIZE]);
        self.argon2()?
            .hash_password_into(secret, salt, &mut out[..])
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(out)
    }
}

/// Seals `private_key` under a key derived from `secret`.
pub fn protect_private_key(
    private_key: &PrivateKey,
    secret: &[u8],
    params: &KdfParams,
) -> CryptoResult<Vec<u8>> {
    params.validate()?;

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let derived = params.derive(secret, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&derived[..])
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let der = private_key.to_der()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), der.as_slice())
        .map_err(|_| CryptoError::Encryption("private key seal failed".to_string()))?;

    let mut blob = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    blob.push(BLOB_VERSION);
    blob.extend_from_slice(&params.memory_kib.to_be_bytes());
    blob.extend_from_slice(&params.iterations.to_be_bytes());
    blob.extend_from_slice(&params.parallelism.to_be_bytes());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Opens a blob produced by [`protect_private_key`].
///
/// A wrong secret and a corrupted ciphertext are indistinguishable and
/// both yield `Decryption`.
pub fn reveal_private_key(blob: &[u8], secret: &[u8]) -> CryptoResult<PrivateKey> {
    let (params, salt, nonce, ciphertext) = parse_blob(blob)?;
    params.validate()?;

    let derived = params.derive(secret, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&derived[..])
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;

    let der = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| {
            CryptoError::Decryption("wrong secret or corrupted private key blob".to_string())
        })?;

    PrivateKey::from_der(&der).map_err(|_| {
        CryptoError::Decryption("protected blob does not hold a private key".to_string())
    })
}

fn parse_blob(blob: &[u8]) -> CryptoResult<(KdfParams, &[u8], &[u8], &[u8])> {
    if blob.len() <= HEADER_SIZE {
        return Err(CryptoError::MalformedBlob(format!(
            "blob too short: {} bytes",
            blob.len()
        )));
    }
    if blob[0] != BLOB_VERSION {
        return Err(CryptoError::MalformedBlob(format!(
            "unsupported blob version {}",
            blob[0]
        )));
    }

    let read_u32 = |offset: usize| {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&blob[offset..offset + 4]);
        u32::from_be_bytes(buf)
    };
    let params = KdfParams {
        memory_kib: read_u32(1),
        iterations: read_u32(5),
        parallelism: read_u32(9),
    };

    let salt_start = 13;
    let nonce_start = salt_start + SALT_SIZE;
    let ct_start = nonce_start + NONCE_SIZE;
    Ok((
        params,
        &blob[salt_start..nonce_start],
        &blob[nonce_start..ct_start],
        &blob[ct_start..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_matches_layout() {
        assert_eq!(HEADER_SIZE, 41);
    }

    #[test]
    fn short_blob_is_malformed() {
        let err = parse_blob(&[BLOB_VERSION; 10]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedBlob(_)));
    }

    #[test]
    fn unknown_version_is_malformed() {
        let mut blob = vec![0u8; HEADER_SIZE + 8];
        blob[0] = 9;
        let err = parse_blob(&blob).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedBlob(msg) if msg.contains("version")));
    }

    #[test]
    fn absurd_params_rejected() {
        let params = KdfParams {
            memory_kib: u32::MAX,
            iterations: 1,
            parallelism: 1,
        };
        assert!(params.validate().is_err());
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::insecure_fast().validate().is_ok());
    }
}
