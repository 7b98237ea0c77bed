//! Collaborator implementations for Lockbox.
//!
//! The encryption core only talks to the traits in `lockbox-types`. This
//! crate ships implementations good enough for tests and single-node
//! deployments:
//!
//! - In-memory arenas keyed by opaque identifiers (users, key records,
//!   file records, blobs, grants)
//! - A DuckDB-backed key-record store
//! - A filesystem byte store with overwrite-before-unlink deletion

mod duck_key_store;
mod fs_store;
mod grants;
mod memory;

pub use duck_key_store::DuckKeyStore;
pub use fs_store::FsByteStorage;
pub use grants::GrantTable;
pub use memory::{MemoryByteStorage, MemoryFileStore, MemoryKeyStore, MemoryUserDirectory};

use lockbox_types::StoreError;

pub(crate) fn lock_poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {e}"))
}
