use crate::envelope::{EnvelopeHeader, WrappedKeys};
use crate::ids::{FileId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::BitOr;

/// Stored metadata for one encrypted file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub owner: UserId,
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Locator returned by byte storage for the ciphertext.
    pub storage_locator: String,
    pub header: EnvelopeHeader,
    pub uploaded_at: DateTime<Utc>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Content keys re-wrapped for users the file was shared with.
    #[serde(default)]
    pub recipient_keys: BTreeMap<UserId, WrappedKeys>,
}

impl FileRecord {
    /// Wrapped content keys usable by `user`, if any were issued to them.
    pub fn wrapped_keys_for(&self, user: &UserId) -> Option<&WrappedKeys> {
        if *user == self.owner {
            Some(&self.header.wrapped_keys)
        } else {
            self.recipient_keys.get(user)
        }
    }
}

/// Permission bit set carried by a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
    pub const DELETE: Self = Self(4);
    pub const SHARE: Self = Self(8);
    pub const OWNER: Self = Self(15);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::OWNER.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Authorization grant of a file to a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub file_id: FileId,
    pub grantee: UserId,
    pub permissions: Permissions,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Grant {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}
