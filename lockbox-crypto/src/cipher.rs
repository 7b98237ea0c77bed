//! Two-layer content cipher.
//!
//! Layer one is AES-256-CBC with PKCS#7 padding and a fresh random IV per
//! call. Layer two is a ChaCha20 keystream XORed over the layer-one output
//! under an independent key. Encryption applies the stream layer last;
//! decryption unwinds it first.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{ContentKey, ContentKeys};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20::cipher::StreamCipher;
use chacha20::ChaCha20;
use rand::rngs::OsRng;
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Block-cipher IV size in bytes.
pub const IV_SIZE: usize = 16;

/// Algorithm tag recorded in every envelope.
pub const ALGORITHM: &str = "AES-256-CBC+CHACHA20";

const AES_BLOCK_SIZE: usize = 16;

// The stream key is generated per envelope and never reused, so a fixed
// nonce never repeats a keystream.
const STREAM_NONCE: [u8; 12] = [0u8; 12];

/// Encrypts `plaintext` with AES-256-CBC under `key`, returning the
/// ciphertext and the freshly generated IV.
pub fn encrypt_block_layer(
    plaintext: &[u8],
    key: &ContentKey,
) -> CryptoResult<(Vec<u8>, [u8; IV_SIZE])> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::Encryption(format!("block layer init: {e}")))?;

    Ok((encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext), iv))
}

/// Reverses [`encrypt_block_layer`].
pub fn decrypt_block_layer(
    ciphertext: &[u8],
    iv: &[u8],
    key: &ContentKey,
) -> CryptoResult<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::Decryption(format!(
            "IV must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::Decryption(
            "ciphertext is not block aligned".to_string(),
        ));
    }

    let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| CryptoError::Decryption(format!("block layer init: {e}")))?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))
}

/// Stateful keystream layer.
///
/// Keeps its keystream position between calls, so feeding a buffer in
/// arbitrary chunks gives the same bytes as one call over the whole buffer.
pub struct StreamLayer {
    cipher: ChaCha20,
}

impl StreamLayer {
    pub fn new(key: &ContentKey) -> Self {
        let cipher = ChaCha20::new(
            chacha20::Key::from_slice(key.as_bytes()),
            chacha20::Nonce::from_slice(&STREAM_NONCE),
        );
        Self { cipher }
    }

    /// XORs the next keystream bytes into `buf`.
    pub fn apply_in_place(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }
}

/// Applies the keystream layer to `bytes`. Involutive: the same call
/// both adds and removes the layer.
pub fn apply_stream_layer(bytes: &[u8], key: &ContentKey) -> Vec<u8> {
    let mut out = bytes.to_vec();
    StreamLayer::new(key).apply_in_place(&mut out);
    out
}

/// Both layers together, with the upload size ceiling enforced.
#[derive(Clone, Copy, Debug)]
pub struct ContentCipher {
    max_plaintext_bytes: usize,
}

impl ContentCipher {
    pub fn new(max_plaintext_bytes: usize) -> Self {
        Self { max_plaintext_bytes }
    }

    pub fn max_plaintext_bytes(&self) -> usize {
        self.max_plaintext_bytes
    }

    /// Block layer only. Fails with `PayloadTooLarge` above the ceiling.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        block_key: &ContentKey,
    ) -> CryptoResult<(Vec<u8>, [u8; IV_SIZE])> {
        if plaintext.len() > self.max_plaintext_bytes {
            return Err(CryptoError::PayloadTooLarge {
                size: plaintext.len(),
                limit: self.max_plaintext_bytes,
            });
        }
        encrypt_block_layer(plaintext, block_key)
    }

    pub fn apply_stream_layer(&self, bytes: &[u8], stream_key: &ContentKey) -> Vec<u8> {
        apply_stream_layer(bytes, stream_key)
    }

    /// Block layer only.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
        block_key: &ContentKey,
    ) -> CryptoResult<Vec<u8>> {
        decrypt_block_layer(ciphertext, iv, block_key)
    }

    /// Block layer then stream layer: the bytes that get stored.
    pub fn seal(
        &self,
        plaintext: &[u8],
        keys: &ContentKeys,
    ) -> CryptoResult<(Vec<u8>, [u8; IV_SIZE])> {
        let (mut layered, iv) = self.encrypt(plaintext, &keys.block)?;
        StreamLayer::new(&keys.stream).apply_in_place(&mut layered);
        Ok((layered, iv))
    }

    /// Stream layer off first, then the block layer.
    pub fn open(&self, ciphertext: &[u8], iv: &[u8], keys: &ContentKeys) -> CryptoResult<Vec<u8>> {
        let unstreamed = self.apply_stream_layer(ciphertext, &keys.stream);
        self.decrypt(&unstreamed, iv, &keys.block)
    }
}
