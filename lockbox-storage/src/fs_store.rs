//! Filesystem blob store.
//!
//! Blobs live flat under a root directory. Deletion overwrites the file
//! contents with random bytes a few times before unlinking it.

use lockbox_types::{ByteStorage, StoreError, StoreResult};
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const OVERWRITE_PASSES: usize = 3;

#[derive(Debug, Clone)]
pub struct FsByteStorage {
    root: PathBuf,
}

impl FsByteStorage {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(e, &root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, locator: &str) -> StoreResult<PathBuf> {
        check_component(locator)?;
        Ok(self.root.join(locator))
    }
}

impl ByteStorage for FsByteStorage {
    fn put(&self, bytes: &[u8], name: &str) -> StoreResult<String> {
        check_component(name)?;
        let locator = format!("{}-{name}", Uuid::new_v4().simple());
        let path = self.root.join(&locator);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| io_error(e, &path))?;
        file.write_all(bytes).map_err(|e| io_error(e, &path))?;
        file.sync_all().map_err(|e| io_error(e, &path))?;

        debug!(locator = %locator, size = bytes.len(), "stored blob");
        Ok(locator)
    }

    fn get(&self, locator: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(locator)?;
        fs::read(&path).map_err(|e| io_error(e, &path))
    }

    fn delete(&self, locator: &str) -> StoreResult<bool> {
        let path = self.path_for(locator)?;
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len() as usize,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(e, &path)),
        };

        if let Err(e) = overwrite(&path, len) {
            // Still unlink; a failed scrub shouldn't leave the blob readable.
            warn!(locator = %locator, error = %e, "overwrite before delete failed");
        }
        fs::remove_file(&path).map_err(|e| io_error(e, &path))?;

        debug!(locator = %locator, "deleted blob");
        Ok(true)
    }
}

fn overwrite(path: &Path, len: usize) -> io::Result<()> {
    let mut noise = vec![0u8; len];
    let mut file = OpenOptions::new().write(true).open(path)?;
    for _ in 0..OVERWRITE_PASSES {
        rand::thread_rng().fill_bytes(&mut noise);
        file.write_all(&noise)?;
        file.sync_data()?;
        io::Seek::rewind(&mut file)?;
    }
    Ok(())
}

/// Names and locators must be a single plain path component.
fn check_component(name: &str) -> StoreResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(StoreError::Backend(format!("invalid blob name: {name:?}")));
    }
    Ok(())
}

fn io_error(e: io::Error, path: &Path) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(format!("blob {}", path.display()))
    } else {
        StoreError::Backend(format!("{}: {e}", path.display()))
    }
}
