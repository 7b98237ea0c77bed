//! Cryptographic primitives for Lockbox.
//!
//! Provides the three leaf components of the file-encryption pipeline:
//! - **Content cipher**: two independently keyed layers over file bytes,
//!   AES-256-CBC first and a ChaCha20 keystream on top
//! - **Key wrapping**: RSA-OAEP (SHA-256) wrap/unwrap of raw content keys
//! - **User key vault**: Argon2id-derived AES-256-GCM protection of a user's
//!   RSA private key
//!
//! # Architecture
//!
//! Each file gets two fresh content keys. The block key drives the CBC
//! layer, the stream key drives the keystream layer, and compromise of one
//! key alone never yields plaintext. Both keys are wrapped under the
//! recipient's RSA public key; the matching private key is itself only
//! stored in vault-protected form.
//!
//! Nothing in this crate persists anything or knows about users.

mod cipher;
mod digest;
mod error;
mod key;
pub mod vault;
pub mod wrap;

pub use cipher::{
    apply_stream_layer, decrypt_block_layer, encrypt_block_layer, ContentCipher, StreamLayer,
    ALGORITHM, IV_SIZE,
};
pub use digest::{digest, verify_digest, DIGEST_ALGORITHM, DIGEST_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{generate_content_key, ContentKey, ContentKeys, KEY_SIZE};
pub use vault::{protect_private_key, reveal_private_key, KdfParams, SALT_SIZE};
pub use wrap::{
    generate_keypair, unwrap_key, wrap_key, KeyBackend, PrivateKey, PublicKey, SoftwareBackend,
    UserKeyPair, DEFAULT_RSA_BITS,
};
