//! In-memory authorization grants.

use crate::lock_poisoned;
use chrono::{DateTime, Utc};
use lockbox_types::{
    AccessOracle, FileId, FileMetadataStore, Grant, GrantStore, Permissions, StoreError,
    StoreResult, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Grant table answering access questions against file ownership.
///
/// Owners always have every permission on their non-deleted files. Anyone
/// else needs an unexpired grant carrying the relevant bit.
#[derive(Clone)]
pub struct GrantTable {
    files: Arc<dyn FileMetadataStore>,
    grants: Arc<RwLock<HashMap<(FileId, UserId), Grant>>>,
}

impl GrantTable {
    pub fn new(files: Arc<dyn FileMetadataStore>) -> Self {
        Self {
            files,
            grants: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Permissions of `user` on `file` as of `now`.
    pub fn permissions_at(
        &self,
        user: &UserId,
        file: &FileId,
        now: DateTime<Utc>,
    ) -> StoreResult<Permissions> {
        let record = match self.files.get(file) {
            Ok(r) => r,
            Err(StoreError::NotFound(_)) => return Ok(Permissions::NONE),
            Err(e) => return Err(e),
        };
        if record.deleted {
            return Ok(Permissions::NONE);
        }
        if record.owner == *user {
            return Ok(Permissions::OWNER);
        }

        let grants = self.grants.read().map_err(lock_poisoned)?;
        Ok(grants
            .get(&(*file, *user))
            .filter(|g| !g.is_expired_at(now))
            .map(|g| g.permissions)
            .unwrap_or(Permissions::NONE))
    }

    /// Grants currently recorded for `file`, expired ones included.
    pub fn grants_for(&self, file: &FileId) -> StoreResult<Vec<Grant>> {
        Ok(self
            .grants
            .read()
            .map_err(lock_poisoned)?
            .values()
            .filter(|g| g.file_id == *file)
            .cloned()
            .collect())
    }
}

impl AccessOracle for GrantTable {
    fn can_access(&self, user: &UserId, file: &FileId) -> StoreResult<bool> {
        Ok(self
            .permissions_at(user, file, Utc::now())?
            .contains(Permissions::READ))
    }
}

impl GrantStore for GrantTable {
    fn can_share(&self, user: &UserId, file: &FileId) -> StoreResult<bool> {
        Ok(self
            .permissions_at(user, file, Utc::now())?
            .contains(Permissions::SHARE))
    }

    fn grant(&self, grant: Grant) -> StoreResult<()> {
        self.grants
            .write()
            .map_err(lock_poisoned)?
            .insert((grant.file_id, grant.grantee), grant);
        Ok(())
    }

    fn revoke(&self, file: &FileId, user: &UserId) -> StoreResult<bool> {
        Ok(self
            .grants
            .write()
            .map_err(lock_poisoned)?
            .remove(&(*file, *user))
            .is_some())
    }

    fn permissions(&self, user: &UserId, file: &FileId) -> StoreResult<Permissions> {
        self.permissions_at(user, file, Utc::now())
    }
}
