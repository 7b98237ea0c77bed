//! Share workflow: grant access to a file and hand the grantee its keys.
//!
//! Grants live in the external [`GrantStore`]; the key side is a pure
//! re-wrap through the [`KeyManager`], so file bytes are never touched.

use crate::error::{EngineError, EngineResult};
use crate::key_manager::KeyManager;
use chrono::{DateTime, Duration, Utc};
use lockbox_types::{FileId, Grant, GrantStore, Permissions, UserId};
use std::sync::Arc;
use tracing::{info, warn};

/// Lifetime of a grant when the caller does not pick one.
pub const DEFAULT_SHARE_EXPIRY_DAYS: i64 = 7;

pub struct ShareManager {
    keys: Arc<KeyManager>,
    grants: Arc<dyn GrantStore>,
}

impl ShareManager {
    pub fn new(keys: Arc<KeyManager>, grants: Arc<dyn GrantStore>) -> Self {
        Self { keys, grants }
    }

    /// Shares `file_id` from `granted_by` to `grantee`.
    ///
    /// `granted_by` needs the share permission. A missing `expires_at`
    /// defaults to [`DEFAULT_SHARE_EXPIRY_DAYS`] from now.
    pub fn share_file(
        &self,
        file_id: &FileId,
        granted_by: &UserId,
        grantee: &UserId,
        permissions: Permissions,
        expires_at: Option<DateTime<Utc>>,
    ) -> EngineResult<Grant> {
        if !self.grants.can_share(granted_by, file_id)? {
            return Err(EngineError::AccessDenied(format!(
                "user {granted_by} may not share file {file_id}"
            )));
        }

        self.keys.reshare_content_keys(file_id, granted_by, grantee)?;

        let now = Utc::now();
        let grant = Grant {
            file_id: *file_id,
            grantee: *grantee,
            permissions,
            granted_by: *granted_by,
            granted_at: now,
            expires_at: Some(
                expires_at.unwrap_or(now + Duration::days(DEFAULT_SHARE_EXPIRY_DAYS)),
            ),
        };

        if let Err(e) = self.grants.grant(grant.clone()) {
            // Don't leave keys behind for a grant that was never recorded.
            if let Err(cleanup) = self.keys.files().remove_recipient_keys(file_id, grantee) {
                warn!(file_id = %file_id, grantee = %grantee, error = %cleanup, "failed to drop reshared keys");
            }
            return Err(e.into());
        }

        info!(
            file_id = %file_id,
            granted_by = %granted_by,
            grantee = %grantee,
            permissions = permissions.bits(),
            "shared file"
        );
        Ok(grant)
    }

    /// Removes `grantee`'s grant and wrapped keys. Returns whether anything
    /// was removed.
    pub fn revoke_share(
        &self,
        file_id: &FileId,
        revoked_by: &UserId,
        grantee: &UserId,
    ) -> EngineResult<bool> {
        if !self.grants.can_share(revoked_by, file_id)? {
            return Err(EngineError::AccessDenied(format!(
                "user {revoked_by} may not manage shares of file {file_id}"
            )));
        }

        let had_grant = self.grants.revoke(file_id, grantee)?;
        let had_keys = self.keys.files().remove_recipient_keys(file_id, grantee)?;

        info!(file_id = %file_id, grantee = %grantee, "revoked share");
        Ok(had_grant || had_keys)
    }
}
