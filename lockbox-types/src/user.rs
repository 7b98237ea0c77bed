use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's asymmetric key material as held by the user directory.
///
/// The private key is only ever present in protected form. The
/// `secret_material` is whatever the directory holds to re-derive the
/// protection key (it must stay stable between registration and every
/// later unwrap, otherwise the private key becomes unrecoverable).
#[derive(Clone, Serialize, Deserialize)]
pub struct UserKeyMaterial {
    pub user_id: UserId,
    /// SPKI DER encoded public key.
    pub public_key: Vec<u8>,
    /// Output of the user key vault's `protect`.
    pub protected_private_key: Vec<u8>,
    pub secret_material: Vec<u8>,
}

// Redacted: the secret material must never reach logs.
impl fmt::Debug for UserKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserKeyMaterial")
            .field("user_id", &self.user_id)
            .field("public_key_len", &self.public_key.len())
            .field("protected_private_key_len", &self.protected_private_key.len())
            .finish_non_exhaustive()
    }
}
