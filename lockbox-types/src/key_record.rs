use crate::ids::{KeyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a key record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Rotated,
    Revoked,
    Expired,
}

impl KeyStatus {
    /// Whether a record in this state may move to `next`.
    ///
    /// Transitions are monotonic: nothing returns to `Active`, and
    /// `Revoked`/`Expired` are final. Staying in the same state is allowed
    /// so that repeated maintenance passes are no-ops.
    pub fn can_transition_to(self, next: KeyStatus) -> bool {
        use KeyStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Active, Rotated | Revoked | Expired) => true,
            (Rotated, Revoked | Expired) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Rotated => "rotated",
            KeyStatus::Revoked => "revoked",
            KeyStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(KeyStatus::Active),
            "rotated" => Ok(KeyStatus::Rotated),
            "revoked" => Ok(KeyStatus::Revoked),
            "expired" => Ok(KeyStatus::Expired),
            other => Err(format!("unknown key status: {other}")),
        }
    }
}

/// Lifecycle metadata for one set of wrapped content keys.
///
/// Tracked independently of any file; files point at a record through
/// their envelope's `key_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_id: KeyId,
    /// User whose public key wrapped `wrapped_key`.
    pub owner: UserId,
    /// Opaque wrapped-key payload (serialized owner key pair).
    pub wrapped_key: Vec<u8>,
    pub algorithm: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    /// Next record in the forward rotation chain.
    pub replacement_key_id: Option<KeyId>,
}

impl KeyRecord {
    /// Creates a fresh `Active` record.
    pub fn active(
        key_id: KeyId,
        owner: UserId,
        wrapped_key: Vec<u8>,
        algorithm: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id,
            owner,
            wrapped_key,
            algorithm: algorithm.into(),
            status: KeyStatus::Active,
            created_at,
            rotated_at: None,
            replacement_key_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}
