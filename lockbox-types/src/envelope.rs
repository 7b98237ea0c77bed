use crate::ids::KeyId;
use serde::{Deserialize, Serialize};

/// The two content keys of one file, each wrapped under the same
/// recipient's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKeys {
    pub block_key: Vec<u8>,
    pub stream_key: Vec<u8>,
}

/// Everything stored for a file except the ciphertext itself.
///
/// This is what the file metadata store persists; the ciphertext lives in
/// byte storage and is rejoined with [`EnvelopeHeader::with_ciphertext`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Identifies the two-layer scheme.
    pub algorithm: String,
    pub key_id: KeyId,
    /// Block-cipher IV.
    pub iv: Vec<u8>,
    /// Content keys wrapped under the owner's public key.
    pub wrapped_keys: WrappedKeys,
    /// Digest over the stored ciphertext.
    pub digest: Vec<u8>,
    pub digest_algorithm: String,
}

impl EnvelopeHeader {
    pub fn with_ciphertext(self, ciphertext: Vec<u8>) -> Envelope {
        Envelope {
            header: self,
            ciphertext,
        }
    }
}

/// Ciphertext plus all the metadata needed to decrypt it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub header: EnvelopeHeader,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn algorithm(&self) -> &str {
        &self.header.algorithm
    }

    pub fn key_id(&self) -> &KeyId {
        &self.header.key_id
    }

    pub fn iv(&self) -> &[u8] {
        &self.header.iv
    }

    pub fn wrapped_block_key(&self) -> &[u8] {
        &self.header.wrapped_keys.block_key
    }

    pub fn wrapped_stream_key(&self) -> &[u8] {
        &self.header.wrapped_keys.stream_key
    }

    pub fn digest(&self) -> &[u8] {
        &self.header.digest
    }

    pub fn digest_algorithm(&self) -> &str {
        &self.header.digest_algorithm
    }

    /// Splits the envelope into its stored header and ciphertext.
    pub fn into_parts(self) -> (EnvelopeHeader, Vec<u8>) {
        (self.header, self.ciphertext)
    }
}
