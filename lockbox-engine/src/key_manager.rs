//! Key manager: the only place that combines key wrapping, the private-key
//! vault and identity lookups.
//!
//! Owns key-id issuance, resharing of content keys to new recipients, and
//! every key-record status transition including rotation.

use crate::config::LockboxConfig;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use lockbox_crypto::{
    protect_private_key, reveal_private_key, ContentKey, ContentKeys, CryptoError, KeyBackend,
    PrivateKey, UserKeyPair, ALGORITHM, KEY_SIZE,
};
use lockbox_types::{
    FileId, FileMetadataStore, FileRecord, KeyId, KeyRecord, KeyRecordStore, KeyStatus,
    StoreError, UserDirectory, UserId, UserKeyMaterial, WrappedKeys,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Outcome of one rotation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// `(old, replacement)` pairs for records that moved to `Rotated`.
    pub rotated: Vec<(KeyId, KeyId)>,
    /// Records that could not be rotated. They keep their current status.
    pub failed: Vec<KeyId>,
}

impl RotationReport {
    pub fn is_empty(&self) -> bool {
        self.rotated.is_empty() && self.failed.is_empty()
    }
}

pub struct KeyManager {
    users: Arc<dyn UserDirectory>,
    records: Arc<dyn KeyRecordStore>,
    files: Arc<dyn FileMetadataStore>,
    backend: Arc<dyn KeyBackend>,
    config: LockboxConfig,
}

impl KeyManager {
    /// Validates `config` and builds a manager on its configured backend.
    pub fn new(
        config: LockboxConfig,
        users: Arc<dyn UserDirectory>,
        records: Arc<dyn KeyRecordStore>,
        files: Arc<dyn FileMetadataStore>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let backend = config.backend()?;
        Ok(Self {
            users,
            records,
            files,
            backend,
            config,
        })
    }

    /// Replaces the key backend.
    pub fn with_backend(mut self, backend: Arc<dyn KeyBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &LockboxConfig {
        &self.config
    }

    pub fn files(&self) -> &Arc<dyn FileMetadataStore> {
        &self.files
    }

    pub fn records(&self) -> &Arc<dyn KeyRecordStore> {
        &self.records
    }

    // ========================================================================
    // User key material
    // ========================================================================

    /// Generates a key pair for `user_id` and stores it protected under
    /// `secret` in the user directory.
    pub fn provision_user(&self, user_id: UserId, secret: &[u8]) -> EngineResult<UserKeyMaterial> {
        let pair = self.backend.generate_keypair(self.config.rsa_bits)?;
        self.enroll_user(user_id, &pair, secret)
    }

    /// Stores an existing key pair for `user_id`, protected under `secret`.
    pub fn enroll_user(
        &self,
        user_id: UserId,
        pair: &UserKeyPair,
        secret: &[u8],
    ) -> EngineResult<UserKeyMaterial> {
        let material = UserKeyMaterial {
            user_id,
            public_key: pair.public.to_der()?,
            protected_private_key: protect_private_key(&pair.private, secret, &self.config.kdf)?,
            secret_material: secret.to_vec(),
        };
        self.users.put_user(material.clone())?;
        info!(user_id = %user_id, backend = self.backend.name(), "provisioned user key pair");
        Ok(material)
    }

    /// Re-protects a user's private key under `new_secret`.
    ///
    /// Wrapped content keys are untouched since the key pair itself does not
    /// change. Fails with `AccessDenied` if `current_secret` is wrong.
    pub fn change_user_secret(
        &self,
        user_id: &UserId,
        current_secret: &[u8],
        new_secret: &[u8],
    ) -> EngineResult<()> {
        let mut material = self.users.get_user(user_id)?;
        let private = reveal_private_key(&material.protected_private_key, current_secret)
            .map_err(|e| reveal_error(user_id, e))?;

        material.protected_private_key =
            protect_private_key(&private, new_secret, &self.config.kdf)?;
        material.secret_material = new_secret.to_vec();
        self.users.put_user(material)?;

        info!(user_id = %user_id, "changed private key protection secret");
        Ok(())
    }

    fn reveal(&self, user_id: &UserId) -> EngineResult<PrivateKey> {
        let material = self.users.get_user(user_id)?;
        reveal_private_key(&material.protected_private_key, &material.secret_material)
            .map_err(|e| reveal_error(user_id, e))
    }

    // ========================================================================
    // Wrapping
    // ========================================================================

    /// Fresh block and stream keys from the backend's RNG.
    pub fn generate_content_keys(&self) -> EngineResult<ContentKeys> {
        Ok(ContentKeys {
            block: ContentKey::from_slice(&self.backend.generate_key(KEY_SIZE))?,
            stream: ContentKey::from_slice(&self.backend.generate_key(KEY_SIZE))?,
        })
    }

    pub fn wrap_content_key(&self, raw_key: &[u8], user_id: &UserId) -> EngineResult<Vec<u8>> {
        let user = self.users.get_user(user_id)?;
        Ok(self.backend.wrap(raw_key, &user.public_key)?)
    }

    pub fn unwrap_content_key(
        &self,
        wrapped: &[u8],
        user_id: &UserId,
    ) -> EngineResult<Zeroizing<Vec<u8>>> {
        let private = self.reveal(user_id)?;
        Ok(self.backend.unwrap(wrapped, &private)?)
    }

    /// Wraps both content keys under one user's public key.
    pub fn wrap_content_keys(&self, keys: &ContentKeys, user_id: &UserId) -> EngineResult<WrappedKeys> {
        let user = self.users.get_user(user_id)?;
        Ok(WrappedKeys {
            block_key: self.backend.wrap(keys.block.as_bytes(), &user.public_key)?,
            stream_key: self.backend.wrap(keys.stream.as_bytes(), &user.public_key)?,
        })
    }

    /// Unwraps both content keys, revealing the user's private key once.
    pub fn unwrap_content_keys(
        &self,
        wrapped: &WrappedKeys,
        user_id: &UserId,
    ) -> EngineResult<ContentKeys> {
        let private = self.reveal(user_id)?;
        self.unwrap_with(wrapped, &private)
    }

    fn unwrap_with(&self, wrapped: &WrappedKeys, private: &PrivateKey) -> EngineResult<ContentKeys> {
        let block = self.backend.unwrap(&wrapped.block_key, private)?;
        let stream = self.backend.unwrap(&wrapped.stream_key, private)?;
        Ok(ContentKeys {
            block: ContentKey::from_slice(&block)?,
            stream: ContentKey::from_slice(&stream)?,
        })
    }

    pub fn issue_key_id(&self) -> KeyId {
        KeyId::random()
    }

    /// Records a new Active key record holding the owner's wrapped keys.
    pub fn register_key(
        &self,
        key_id: KeyId,
        owner: UserId,
        wrapped: &WrappedKeys,
        created_at: DateTime<Utc>,
    ) -> EngineResult<KeyRecord> {
        let record = KeyRecord::active(key_id, owner, encode_payload(wrapped)?, ALGORITHM, created_at);
        self.records.create(record.clone())?;
        debug!(key_id = %record.key_id, owner = %owner, "registered key record");
        Ok(record)
    }

    // ========================================================================
    // Sharing
    // ========================================================================

    /// Re-wraps a file's content keys from `from` to `to` and stores the
    /// result on the file record. The ciphertext is never read.
    pub fn reshare_content_keys(
        &self,
        file_id: &FileId,
        from: &UserId,
        to: &UserId,
    ) -> EngineResult<WrappedKeys> {
        let file = self.live_file(file_id)?;
        if *to == file.owner {
            return Ok(file.header.wrapped_keys);
        }

        let source = file.wrapped_keys_for(from).ok_or_else(|| {
            EngineError::NotFound(format!("no keys issued to user {from} for file {file_id}"))
        })?;
        let keys = self.unwrap_content_keys(source, from)?;
        let rewrapped = self.wrap_content_keys(&keys, to)?;

        self.files.put_recipient_keys(file_id, to, rewrapped.clone())?;
        info!(file_id = %file_id, from = %from, to = %to, "reshared content keys");
        Ok(rewrapped)
    }

    fn live_file(&self, file_id: &FileId) -> EngineResult<FileRecord> {
        let file = self.files.get(file_id)?;
        if file.deleted {
            return Err(EngineError::NotFound(format!("file {file_id}")));
        }
        Ok(file)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn revoke_key(&self, key_id: &KeyId) -> EngineResult<KeyRecord> {
        self.transition(key_id, KeyStatus::Revoked)
    }

    pub fn expire_key(&self, key_id: &KeyId) -> EngineResult<KeyRecord> {
        self.transition(key_id, KeyStatus::Expired)
    }

    fn transition(&self, key_id: &KeyId, next: KeyStatus) -> EngineResult<KeyRecord> {
        let mut record = self.records.get(key_id)?;
        if record.status == next {
            return Ok(record);
        }
        if !record.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                key_id: key_id.clone(),
                from: record.status,
                to: next,
            });
        }
        let from = record.status;
        record.status = next;
        self.records.update_if_status(record.clone(), from)?;
        info!(key_id = %key_id, from = %from, to = %next, "key status changed");
        Ok(record)
    }

    /// Follows the replacement chain from `key_id` to its newest record.
    pub fn resolve_current_key(&self, key_id: &KeyId) -> EngineResult<KeyRecord> {
        let mut seen = HashSet::new();
        let mut record = self.records.get(key_id)?;
        while let Some(next) = record.replacement_key_id.clone() {
            if !seen.insert(record.key_id.clone()) {
                return Err(EngineError::Storage(format!(
                    "replacement chain from key {key_id} loops at {}",
                    record.key_id
                )));
            }
            record = self.records.get(&next)?;
        }
        Ok(record)
    }

    /// Rotates every Active record older than the rotation window.
    pub fn rotate(&self) -> EngineResult<RotationReport> {
        self.rotate_at(Utc::now())
    }

    /// [`rotate`](Self::rotate) with an explicit clock.
    ///
    /// Replacements are created with `created_at = now`, so running this
    /// again with the same `now` finds nothing to do.
    pub fn rotate_at(&self, now: DateTime<Utc>) -> EngineResult<RotationReport> {
        let cutoff = now - self.config.rotation_window();
        let due = self.records.list_expiring_before(cutoff)?;
        let mut report = RotationReport::default();

        for record in due {
            match self.rotate_record(&record, now) {
                Ok(replacement) => report.rotated.push((record.key_id, replacement)),
                Err(e) => {
                    warn!(key_id = %record.key_id, error = %e, "key rotation failed");
                    report.failed.push(record.key_id);
                }
            }
        }

        if !report.is_empty() {
            info!(
                rotated = report.rotated.len(),
                failed = report.failed.len(),
                "key rotation pass finished"
            );
        }
        Ok(report)
    }

    fn rotate_record(&self, record: &KeyRecord, now: DateTime<Utc>) -> EngineResult<KeyId> {
        let owner_private = self.reveal(&record.owner)?;
        let keys = self.unwrap_with(&decode_payload(record)?, &owner_private)?;

        // Every unwrap and wrap happens before the first write.
        let replacement_id = self.issue_key_id();
        let owner_wrapped = self.wrap_content_keys(&keys, &record.owner)?;
        let originals = self.files.files_for_key(&record.key_id)?;
        let rewrapped = originals
            .iter()
            .map(|file| self.rewrapped_file(file, &replacement_id))
            .collect::<EngineResult<Vec<_>>>()?;

        self.register_key(replacement_id.clone(), record.owner, &owner_wrapped, now)?;
        if let Err(e) = self.commit_rotation(record, &replacement_id, &originals, rewrapped, now) {
            self.discard_key(&replacement_id);
            return Err(e);
        }

        info!(key_id = %record.key_id, replacement = %replacement_id, "rotated key");
        Ok(replacement_id)
    }

    /// Moves the files over to `replacement_id`, then retires the old record.
    /// On failure, files already moved are restored from `originals`.
    fn commit_rotation(
        &self,
        record: &KeyRecord,
        replacement_id: &KeyId,
        originals: &[FileRecord],
        rewrapped: Vec<FileRecord>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut moved = 0;
        let result = self
            .save_files(rewrapped, &mut moved)
            .and_then(|()| self.retire_record(&record.key_id, replacement_id, now));

        if result.is_err() {
            for original in &originals[..moved] {
                if let Err(e) = self.files.save(original.clone()) {
                    warn!(file_id = %original.id, error = %e, "failed to restore file after aborted rotation");
                }
            }
        }
        result
    }

    fn save_files(&self, files: Vec<FileRecord>, saved: &mut usize) -> EngineResult<()> {
        for file in files {
            let (file_id, key_id) = (file.id, file.header.key_id.clone());
            self.files.save(file)?;
            *saved += 1;
            debug!(file_id = %file_id, key_id = %key_id, "re-wrapped file keys");
        }
        Ok(())
    }

    /// Marks `key_id` Rotated with a pointer to `replacement_id`. The record
    /// must still be Active at the moment of the write, so a concurrent
    /// revoke is never overwritten.
    fn retire_record(
        &self,
        key_id: &KeyId,
        replacement_id: &KeyId,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let mut old = self.records.get(key_id)?;
        let from = old.status;
        old.status = KeyStatus::Rotated;
        old.rotated_at = Some(now);
        old.replacement_key_id = Some(replacement_id.clone());

        match self.records.update_if_status(old, KeyStatus::Active) {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(_)) => Err(EngineError::InvalidTransition {
                key_id: key_id.clone(),
                from: self.records.get(key_id).map(|r| r.status).unwrap_or(from),
                to: KeyStatus::Rotated,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// A copy of `file` with its owner and grantee keys re-wrapped under
    /// their current public keys, pointing at `key_id`.
    fn rewrapped_file(&self, file: &FileRecord, key_id: &KeyId) -> EngineResult<FileRecord> {
        let keys = self.unwrap_content_keys(&file.header.wrapped_keys, &file.owner)?;

        let mut recipients = BTreeMap::new();
        for grantee in file.recipient_keys.keys() {
            recipients.insert(*grantee, self.wrap_content_keys(&keys, grantee)?);
        }

        let mut next = file.clone();
        next.header.wrapped_keys = self.wrap_content_keys(&keys, &file.owner)?;
        next.header.key_id = key_id.clone();
        next.recipient_keys = recipients;
        Ok(next)
    }

    /// Moves a record nothing will reference to `Revoked`, so rotation
    /// passes skip it. Failures are logged, not returned.
    pub(crate) fn discard_key(&self, key_id: &KeyId) {
        match self.transition(key_id, KeyStatus::Revoked) {
            Ok(_) => debug!(key_id = %key_id, "discarded unused key record"),
            Err(e) => warn!(key_id = %key_id, error = %e, "failed to discard unused key record"),
        }
    }
}

fn encode_payload(wrapped: &WrappedKeys) -> EngineResult<Vec<u8>> {
    serde_json::to_vec(wrapped).map_err(|e| EngineError::Storage(e.to_string()))
}

fn decode_payload(record: &KeyRecord) -> EngineResult<WrappedKeys> {
    serde_json::from_slice(&record.wrapped_key).map_err(|e| {
        EngineError::KeyFormat(format!("payload of key record {}: {e}", record.key_id))
    })
}

fn reveal_error(user_id: &UserId, e: CryptoError) -> EngineError {
    match e {
        CryptoError::KeyFormat(msg) => EngineError::KeyFormat(msg),
        other => {
            debug!(user_id = %user_id, error = %other, "private key reveal failed");
            EngineError::AccessDenied(format!("private key of user {user_id} is unavailable"))
        }
    }
}
