//! Lockbox encryption core.
//!
//! - [`KeyManager`]: user key provisioning, content-key wrap/unwrap,
//!   resharing, key-record lifecycle and rotation
//! - [`EncryptionEngine`]: envelope encrypt/decrypt with an integrity gate,
//!   plus file-level upload, download and delete over the collaborators
//! - [`ShareManager`]: grant-then-rewrap sharing workflow
//! - [`spawn_rotation_task`]: periodic rotation on a tokio runtime
//!
//! Collaborators (user directory, key-record store, file metadata, byte
//! storage, grants) are consumed through the traits in `lockbox-types`.

pub mod config;
mod engine;
pub mod error;
mod key_manager;
mod scheduler;
mod sharing;
pub mod telemetry;

pub use config::LockboxConfig;
pub use engine::EncryptionEngine;
pub use error::{EngineError, EngineResult};
pub use key_manager::{KeyManager, RotationReport};
pub use scheduler::spawn_rotation_task;
pub use sharing::{ShareManager, DEFAULT_SHARE_EXPIRY_DAYS};
