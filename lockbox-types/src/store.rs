//! Contracts consumed from external collaborators.
//!
//! Implementations own persistence and consistency; the encryption core only
//! calls these through `Arc<dyn Trait>` and never caches what they return
//! across operations.

use crate::envelope::WrappedKeys;
use crate::file::{FileRecord, Grant, Permissions};
use crate::ids::{FileId, KeyId, UserId};
use crate::key_record::{KeyRecord, KeyStatus};
use crate::user::UserKeyMaterial;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for collaborator calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by collaborator implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Lookup of users' key material.
pub trait UserDirectory: Send + Sync {
    fn get_user(&self, id: &UserId) -> StoreResult<UserKeyMaterial>;

    /// Inserts or replaces a user's key material.
    fn put_user(&self, user: UserKeyMaterial) -> StoreResult<()>;
}

/// Key-record persistence.
pub trait KeyRecordStore: Send + Sync {
    fn get(&self, key_id: &KeyId) -> StoreResult<KeyRecord>;

    /// Fails with `Conflict` if the id already exists.
    fn create(&self, record: KeyRecord) -> StoreResult<()>;

    /// Fails with `NotFound` if the id does not exist.
    fn update(&self, record: KeyRecord) -> StoreResult<()>;

    /// Like `update`, but only while the stored status is still
    /// `expected`; otherwise fails with `Conflict`. Check and write are
    /// atomic with respect to other calls on the same store.
    fn update_if_status(&self, record: KeyRecord, expected: KeyStatus) -> StoreResult<()>;

    /// Active records created strictly before `cutoff`.
    fn list_expiring_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<KeyRecord>>;
}

/// File metadata persistence. Deleted records stay readable with
/// `deleted == true`.
pub trait FileMetadataStore: Send + Sync {
    fn get(&self, id: &FileId) -> StoreResult<FileRecord>;

    /// Inserts or replaces a file record.
    fn save(&self, record: FileRecord) -> StoreResult<()>;

    /// All records (deleted or not) whose envelope references `key_id`.
    fn files_for_key(&self, key_id: &KeyId) -> StoreResult<Vec<FileRecord>>;

    /// Stores a grantee's re-wrapped content keys on an existing record.
    fn put_recipient_keys(
        &self,
        id: &FileId,
        user: &UserId,
        keys: WrappedKeys,
    ) -> StoreResult<()> {
        let mut record = self.get(id)?;
        record.recipient_keys.insert(*user, keys);
        self.save(record)
    }

    /// Removes a grantee's wrapped keys. Returns whether any were present.
    fn remove_recipient_keys(&self, id: &FileId, user: &UserId) -> StoreResult<bool> {
        let mut record = self.get(id)?;
        let removed = record.recipient_keys.remove(user).is_some();
        if removed {
            self.save(record)?;
        }
        Ok(removed)
    }
}

/// Content-agnostic blob storage.
pub trait ByteStorage: Send + Sync {
    /// Stores `bytes` under `name`, returning a locator for later access.
    fn put(&self, bytes: &[u8], name: &str) -> StoreResult<String>;

    fn get(&self, locator: &str) -> StoreResult<Vec<u8>>;

    /// Returns `false` if nothing was stored at `locator`.
    fn delete(&self, locator: &str) -> StoreResult<bool>;
}

/// Authorization decision point. Consulted by callers before decrypting.
pub trait AccessOracle: Send + Sync {
    fn can_access(&self, user: &UserId, file: &FileId) -> StoreResult<bool>;
}

/// Grant persistence behind an [`AccessOracle`].
pub trait GrantStore: AccessOracle {
    /// Whether `user` may extend access to `file` to others.
    fn can_share(&self, user: &UserId, file: &FileId) -> StoreResult<bool>;

    /// Records (or replaces) the grant for `grant.grantee`.
    fn grant(&self, grant: Grant) -> StoreResult<()>;

    /// Removes a grantee's grant. Returns whether one existed.
    fn revoke(&self, file: &FileId, user: &UserId) -> StoreResult<bool>;

    /// Current permissions of `user` on `file`, ignoring expired grants.
    fn permissions(&self, user: &UserId, file: &FileId) -> StoreResult<Permissions>;
}
