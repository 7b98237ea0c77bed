//! Encryption engine: the top-level façade.
//!
//! Stateless across calls; everything needed to decrypt lives in the
//! envelope. Integrity is checked against the stored digest before any key
//! material is unwrapped.

use crate::error::{EngineError, EngineResult};
use crate::key_manager::KeyManager;
use chrono::Utc;
use lockbox_crypto::{digest, verify_digest, ContentCipher, ALGORITHM, DIGEST_ALGORITHM};
use lockbox_types::{
    ByteStorage, Envelope, EnvelopeHeader, FileId, FileRecord, UserId, WrappedKeys,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EncryptionEngine {
    keys: Arc<KeyManager>,
    blobs: Arc<dyn ByteStorage>,
    cipher: ContentCipher,
}

impl EncryptionEngine {
    pub fn new(keys: Arc<KeyManager>, blobs: Arc<dyn ByteStorage>) -> Self {
        let cipher = ContentCipher::new(keys.config().max_upload_bytes);
        Self {
            keys,
            blobs,
            cipher,
        }
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    // ========================================================================
    // Envelope operations
    // ========================================================================

    /// Encrypts `plaintext` for `owner` into a complete envelope.
    ///
    /// Content keys are fresh per call and dropped (zeroized) on return;
    /// only their wrapped forms leave this function.
    pub fn encrypt(&self, plaintext: &[u8], owner: &UserId) -> EngineResult<Envelope> {
        if plaintext.len() > self.cipher.max_plaintext_bytes() {
            warn!(
                owner = %owner,
                size = plaintext.len(),
                limit = self.cipher.max_plaintext_bytes(),
                "plaintext exceeds upload ceiling"
            );
            return Err(EngineError::CryptoFailure);
        }

        let content_keys = self.keys.generate_content_keys()?;
        let (ciphertext, iv) = self.cipher.seal(plaintext, &content_keys)?;
        let ciphertext_digest = digest(&ciphertext);

        let key_id = self.keys.issue_key_id();
        let wrapped_keys = self.keys.wrap_content_keys(&content_keys, owner)?;
        drop(content_keys);

        // Last fallible step, so a failed encrypt leaves no key record behind.
        self.keys
            .register_key(key_id.clone(), *owner, &wrapped_keys, Utc::now())?;

        debug!(owner = %owner, key_id = %key_id, size = plaintext.len(), "encrypted content");
        Ok(EnvelopeHeader {
            algorithm: ALGORITHM.to_string(),
            key_id,
            iv: iv.to_vec(),
            wrapped_keys,
            digest: ciphertext_digest,
            digest_algorithm: DIGEST_ALGORITHM.to_string(),
        }
        .with_ciphertext(ciphertext))
    }

    /// Decrypts an envelope for `user`.
    ///
    /// The caller must already have authorized `user` for the content. If a
    /// stored file carries this envelope and holds keys re-wrapped for
    /// `user`, those are used; otherwise the envelope's own wrapped keys.
    pub fn decrypt(&self, envelope: &Envelope, user: &UserId) -> EngineResult<Vec<u8>> {
        check_integrity(envelope)?;
        let wrapped = self.select_wrapped_keys(envelope, user)?;
        self.open(envelope, &wrapped, user)
    }

    /// Decrypts `envelope` with an explicit set of wrapped keys.
    pub fn decrypt_with(
        &self,
        envelope: &Envelope,
        wrapped: &WrappedKeys,
        user: &UserId,
    ) -> EngineResult<Vec<u8>> {
        check_integrity(envelope)?;
        self.open(envelope, wrapped, user)
    }

    fn select_wrapped_keys(&self, envelope: &Envelope, user: &UserId) -> EngineResult<WrappedKeys> {
        let stored = self.keys.files().files_for_key(envelope.key_id())?;
        let file = stored
            .into_iter()
            .find(|f| f.header.digest.as_slice() == envelope.digest());

        match file {
            Some(f) if f.deleted => Err(EngineError::NotFound(format!("file {}", f.id))),
            Some(f) => Ok(f
                .recipient_keys
                .get(user)
                .cloned()
                .unwrap_or_else(|| envelope.header.wrapped_keys.clone())),
            None => Ok(envelope.header.wrapped_keys.clone()),
        }
    }

    /// Unwinds both layers. Integrity must already have been checked.
    fn open(&self, envelope: &Envelope, wrapped: &WrappedKeys, user: &UserId) -> EngineResult<Vec<u8>> {
        if envelope.algorithm() != ALGORITHM {
            debug!(key_id = %envelope.key_id(), algorithm = envelope.algorithm(), "unsupported algorithm");
            return Err(EngineError::CryptoFailure);
        }

        let content_keys = self.keys.unwrap_content_keys(wrapped, user)?;
        let plaintext = self
            .cipher
            .open(&envelope.ciphertext, envelope.iv(), &content_keys)?;

        debug!(user = %user, key_id = %envelope.key_id(), "decrypted content");
        Ok(plaintext)
    }

    // ========================================================================
    // File operations
    // ========================================================================

    /// Encrypts `plaintext`, stores the ciphertext and saves the file record.
    ///
    /// If the ciphertext or the record cannot be stored, the key record
    /// issued for it is revoked so rotation never picks it up.
    pub fn upload(&self, plaintext: &[u8], name: &str, owner: &UserId) -> EngineResult<FileRecord> {
        let (header, ciphertext) = self.encrypt(plaintext, owner)?.into_parts();
        let locator = match self.blobs.put(&ciphertext, name) {
            Ok(locator) => locator,
            Err(e) => {
                self.keys.discard_key(&header.key_id);
                return Err(e.into());
            }
        };

        let record = FileRecord {
            id: FileId::new(),
            owner: *owner,
            name: name.to_string(),
            size: plaintext.len() as u64,
            storage_locator: locator,
            header,
            uploaded_at: Utc::now(),
            deleted: false,
            deleted_at: None,
            recipient_keys: Default::default(),
        };

        if let Err(e) = self.keys.files().save(record.clone()) {
            if let Err(cleanup) = self.blobs.delete(&record.storage_locator) {
                warn!(file_id = %record.id, error = %cleanup, "failed to remove orphaned blob");
            }
            self.keys.discard_key(&record.header.key_id);
            return Err(e.into());
        }

        info!(file_id = %record.id, owner = %owner, size = record.size, key_id = %record.header.key_id, "uploaded file");
        Ok(record)
    }

    /// Rejoins a live file's stored header with its ciphertext.
    pub fn load_envelope(&self, file_id: &FileId) -> EngineResult<Envelope> {
        let record = self.live_file(file_id)?;
        let ciphertext = self.blobs.get(&record.storage_locator)?;
        Ok(record.header.with_ciphertext(ciphertext))
    }

    /// Loads and decrypts a stored file with the keys issued to `user`.
    pub fn decrypt_file(&self, file_id: &FileId, user: &UserId) -> EngineResult<Vec<u8>> {
        let record = self.live_file(file_id)?;
        let wrapped = record.wrapped_keys_for(user).cloned().ok_or_else(|| {
            EngineError::NotFound(format!("no keys issued to user {user} for file {file_id}"))
        })?;

        let ciphertext = self.blobs.get(&record.storage_locator)?;
        let envelope = record.header.with_ciphertext(ciphertext);
        check_integrity(&envelope)?;
        self.open(&envelope, &wrapped, user)
    }

    /// Marks a file deleted and removes its ciphertext. The key record is
    /// left in place.
    pub fn delete_file(&self, file_id: &FileId) -> EngineResult<()> {
        let mut record = self.live_file(file_id)?;
        record.deleted = true;
        record.deleted_at = Some(Utc::now());
        let locator = record.storage_locator.clone();
        self.keys.files().save(record)?;

        if !self.blobs.delete(&locator)? {
            warn!(file_id = %file_id, "ciphertext was already gone");
        }
        info!(file_id = %file_id, "deleted file");
        Ok(())
    }

    fn live_file(&self, file_id: &FileId) -> EngineResult<FileRecord> {
        let record = self.keys.files().get(file_id)?;
        if record.deleted {
            return Err(EngineError::NotFound(format!("file {file_id}")));
        }
        Ok(record)
    }
}

fn check_integrity(envelope: &Envelope) -> EngineResult<()> {
    if envelope.digest_algorithm() != DIGEST_ALGORITHM
        || !verify_digest(&envelope.ciphertext, envelope.digest())
    {
        warn!(key_id = %envelope.key_id(), "ciphertext digest mismatch");
        return Err(EngineError::IntegrityFailure(format!(
            "ciphertext for key {} does not match its digest",
            envelope.key_id()
        )));
    }
    Ok(())
}
