//! Shared types for Lockbox.
//!
//! Everything here is plain data plus the narrow contracts the encryption
//! core consumes from its collaborators (user directory, key-record store,
//! file metadata store, byte storage, authorization oracle). Records refer
//! to each other only through opaque identifiers; there are no
//! back-references between users, files and keys.

mod envelope;
mod file;
mod ids;
mod key_record;
mod store;
mod user;

pub use envelope::{Envelope, EnvelopeHeader, WrappedKeys};
pub use file::{FileRecord, Grant, Permissions};
pub use ids::{FileId, KeyId, UserId, KEY_ID_LEN};
pub use key_record::{KeyRecord, KeyStatus};
pub use store::{
    AccessOracle, ByteStorage, FileMetadataStore, GrantStore, KeyRecordStore, StoreError,
    StoreResult, UserDirectory,
};
pub use user::UserKeyMaterial;
