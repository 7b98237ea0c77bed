//! Asymmetric wrapping of content keys.
//!
//! Raw content keys are encrypted under a recipient's RSA public key with
//! OAEP padding over SHA-256. Public keys travel as SPKI DER, private keys
//! as PKCS#8 DER (and only ever inside a vault-protected blob at rest).

use crate::error::{CryptoError, CryptoResult};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Modulus size for newly provisioned user keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// A recipient's RSA public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Parses an SPKI DER public key.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| CryptoError::KeyFormat(format!("public key: {e}")))
    }

    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::KeyFormat(format!("public key encoding: {e}")))
    }
}

/// A user's RSA private key. The inner key zeroizes itself on drop.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Parses a PKCS#8 DER private key.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::KeyFormat(format!("private key: {e}")))
    }

    pub fn to_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.0
            .to_pkcs8_der()
            .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
            .map_err(|e| CryptoError::KeyFormat(format!("private key encoding: {e}")))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Freshly generated key pair for a user.
#[derive(Debug)]
pub struct UserKeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// Generates an RSA key pair with a `bits`-bit modulus.
pub fn generate_keypair(bits: usize) -> CryptoResult<UserKeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::KeyFormat(format!("key generation: {e}")))?;
    let public = private.to_public_key();
    Ok(UserKeyPair {
        public: PublicKey(public),
        private: PrivateKey(private),
    })
}

/// Wraps `raw_key` under `public_key` (RSA-OAEP, SHA-256).
pub fn wrap_key(raw_key: &[u8], public_key: &PublicKey) -> CryptoResult<Vec<u8>> {
    public_key
        .0
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), raw_key)
        .map_err(|e| CryptoError::Encryption(format!("key wrap failed: {e}")))
}

/// Recovers the raw key from a wrapped blob.
///
/// Any padding or size problem is reported as the same `Decryption` error.
pub fn unwrap_key(wrapped: &[u8], private_key: &PrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    private_key
        .0
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Decryption("wrapped key did not unwrap".to_string()))
}

/// Abstract wrap/unwrap/generate contract.
///
/// [`SoftwareBackend`] does everything in process; a hardware module would
/// implement the same trait.
pub trait KeyBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Wraps `raw_key` under an SPKI DER public key.
    fn wrap(&self, raw_key: &[u8], public_key_der: &[u8]) -> CryptoResult<Vec<u8>>;

    fn unwrap(&self, wrapped: &[u8], private_key: &PrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>>;

    /// `len` random bytes suitable as a symmetric key.
    fn generate_key(&self, len: usize) -> Zeroizing<Vec<u8>>;

    fn generate_keypair(&self, bits: usize) -> CryptoResult<UserKeyPair>;
}

/// In-process RSA-OAEP backend on the OS RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftwareBackend;

impl KeyBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn wrap(&self, raw_key: &[u8], public_key_der: &[u8]) -> CryptoResult<Vec<u8>> {
        let public_key = PublicKey::from_der(public_key_der)?;
        wrap_key(raw_key, &public_key)
    }

    fn unwrap(&self, wrapped: &[u8], private_key: &PrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
        unwrap_key(wrapped, private_key)
    }

    fn generate_key(&self, len: usize) -> Zeroizing<Vec<u8>> {
        let mut key = Zeroizing::new(vec![0u8; len]);
        OsRng.fill_bytes(&mut key);
        key
    }

    fn generate_keypair(&self, bits: usize) -> CryptoResult<UserKeyPair> {
        generate_keypair(bits)
    }
}
