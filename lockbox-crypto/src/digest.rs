//! Ciphertext digest.

use sha2::{Digest, Sha512};

pub const DIGEST_ALGORITHM: &str = "SHA-512";
pub const DIGEST_SIZE: usize = 64;

/// SHA-512 over `bytes`.
pub fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha512::digest(bytes).to_vec()
}

/// Recomputes the digest of `bytes` and compares it byte-for-byte.
pub fn verify_digest(bytes: &[u8], expected: &[u8]) -> bool {
    expected.len() == DIGEST_SIZE && digest(bytes).as_slice() == expected
}
