//! Shared fixture: in-memory collaborators plus pre-generated key pairs.
#![allow(dead_code)]

use lockbox_crypto::{generate_keypair, UserKeyPair, DEFAULT_RSA_BITS};
use lockbox_engine::{EncryptionEngine, KeyManager, LockboxConfig, ShareManager};
use lockbox_storage::{
    GrantTable, MemoryByteStorage, MemoryFileStore, MemoryKeyStore, MemoryUserDirectory,
};
use lockbox_types::UserId;
use std::sync::{Arc, OnceLock};

// RSA generation dominates test time, so every test shares these.
fn keypair(slot: usize) -> &'static UserKeyPair {
    static PAIRS: OnceLock<Vec<UserKeyPair>> = OnceLock::new();
    &PAIRS.get_or_init(|| {
        (0..3)
            .map(|_| generate_keypair(DEFAULT_RSA_BITS).unwrap())
            .collect()
    })[slot]
}

pub struct Fixture {
    pub users: MemoryUserDirectory,
    pub records: MemoryKeyStore,
    pub files: MemoryFileStore,
    pub blobs: MemoryByteStorage,
    pub grants: GrantTable,
    pub keys: Arc<KeyManager>,
    pub engine: EncryptionEngine,
    pub shares: ShareManager,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(LockboxConfig::fast_kdf())
    }

    pub fn with_config(config: LockboxConfig) -> Self {
        let users = MemoryUserDirectory::new();
        let records = MemoryKeyStore::new();
        let files = MemoryFileStore::new();
        let blobs = MemoryByteStorage::new();
        let grants = GrantTable::new(Arc::new(files.clone()));

        let keys = Arc::new(
            KeyManager::new(
                config,
                Arc::new(users.clone()),
                Arc::new(records.clone()),
                Arc::new(files.clone()),
            )
            .unwrap(),
        );
        let engine = EncryptionEngine::new(keys.clone(), Arc::new(blobs.clone()));
        let shares = ShareManager::new(keys.clone(), Arc::new(grants.clone()));

        Self {
            users,
            records,
            files,
            blobs,
            grants,
            keys,
            engine,
            shares,
        }
    }

    /// Enrolls a user with cached key pair number `slot` (0..3).
    pub fn user(&self, slot: usize) -> UserId {
        let id = UserId::new();
        let secret = format!("passphrase-{slot}");
        self.keys
            .enroll_user(id, keypair(slot), secret.as_bytes())
            .unwrap();
        id
    }
}
