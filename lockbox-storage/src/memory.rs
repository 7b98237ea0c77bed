//! In-memory arena stores.
//!
//! Each store is a `RwLock<HashMap<Id, Record>>` behind an `Arc`, so clones
//! share state. Writes become visible to every later read as soon as the
//! call returns.

use crate::lock_poisoned;
use chrono::{DateTime, Utc};
use lockbox_types::{
    ByteStorage, FileId, FileMetadataStore, FileRecord, KeyId, KeyRecord, KeyRecordStore,
    KeyStatus, StoreError, StoreResult, UserDirectory, UserId, UserKeyMaterial,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, UserKeyMaterial>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn get_user(&self, id: &UserId) -> StoreResult<UserKeyMaterial> {
        self.users
            .read()
            .map_err(lock_poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    fn put_user(&self, user: UserKeyMaterial) -> StoreResult<()> {
        self.users
            .write()
            .map_err(lock_poisoned)?
            .insert(user.user_id, user);
        Ok(())
    }
}

// ============================================================================
// Key records
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    records: Arc<RwLock<HashMap<KeyId, KeyRecord>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in no particular order.
    pub fn all(&self) -> StoreResult<Vec<KeyRecord>> {
        Ok(self
            .records
            .read()
            .map_err(lock_poisoned)?
            .values()
            .cloned()
            .collect())
    }
}

impl KeyRecordStore for MemoryKeyStore {
    fn get(&self, key_id: &KeyId) -> StoreResult<KeyRecord> {
        self.records
            .read()
            .map_err(lock_poisoned)?
            .get(key_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("key record {key_id}")))
    }

    fn create(&self, record: KeyRecord) -> StoreResult<()> {
        let mut records = self.records.write().map_err(lock_poisoned)?;
        if records.contains_key(&record.key_id) {
            return Err(StoreError::Conflict(format!(
                "key record {} already exists",
                record.key_id
            )));
        }
        records.insert(record.key_id.clone(), record);
        Ok(())
    }

    fn update(&self, record: KeyRecord) -> StoreResult<()> {
        let mut records = self.records.write().map_err(lock_poisoned)?;
        match records.get_mut(&record.key_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("key record {}", record.key_id))),
        }
    }

    fn update_if_status(&self, record: KeyRecord, expected: KeyStatus) -> StoreResult<()> {
        let mut records = self.records.write().map_err(lock_poisoned)?;
        match records.get_mut(&record.key_id) {
            Some(slot) if slot.status == expected => {
                *slot = record;
                Ok(())
            }
            Some(slot) => Err(StoreError::Conflict(format!(
                "key record {} is {}, expected {expected}",
                record.key_id, slot.status
            ))),
            None => Err(StoreError::NotFound(format!("key record {}", record.key_id))),
        }
    }

    fn list_expiring_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<KeyRecord>> {
        let mut due: Vec<KeyRecord> = self
            .records
            .read()
            .map_err(lock_poisoned)?
            .values()
            .filter(|r| r.is_active() && r.created_at < cutoff)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(due)
    }
}

// ============================================================================
// File metadata
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<RwLock<HashMap<FileId, FileRecord>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileMetadataStore for MemoryFileStore {
    fn get(&self, id: &FileId) -> StoreResult<FileRecord> {
        self.files
            .read()
            .map_err(lock_poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("file {id}")))
    }

    fn save(&self, record: FileRecord) -> StoreResult<()> {
        self.files
            .write()
            .map_err(lock_poisoned)?
            .insert(record.id, record);
        Ok(())
    }

    fn files_for_key(&self, key_id: &KeyId) -> StoreResult<Vec<FileRecord>> {
        Ok(self
            .files
            .read()
            .map_err(lock_poisoned)?
            .values()
            .filter(|f| &f.header.key_id == key_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Blobs
// ============================================================================

/// Blob storage in a hash map. Locators are `<uuid>/<name>`.
#[derive(Clone, Default)]
pub struct MemoryByteStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryByteStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a stored blob in place. Test hook for simulating
    /// at-rest corruption.
    pub fn tamper(&self, locator: &str, f: impl FnOnce(&mut Vec<u8>)) -> StoreResult<()> {
        let mut blobs = self.blobs.write().map_err(lock_poisoned)?;
        let blob = blobs
            .get_mut(locator)
            .ok_or_else(|| StoreError::NotFound(format!("blob {locator}")))?;
        f(blob);
        Ok(())
    }
}

impl ByteStorage for MemoryByteStorage {
    fn put(&self, bytes: &[u8], name: &str) -> StoreResult<String> {
        let locator = format!("{}/{name}", Uuid::new_v4().simple());
        self.blobs
            .write()
            .map_err(lock_poisoned)?
            .insert(locator.clone(), bytes.to_vec());
        Ok(locator)
    }

    fn get(&self, locator: &str) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .map_err(lock_poisoned)?
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("blob {locator}")))
    }

    fn delete(&self, locator: &str) -> StoreResult<bool> {
        Ok(self
            .blobs
            .write()
            .map_err(lock_poisoned)?
            .remove(locator)
            .is_some())
    }
}
