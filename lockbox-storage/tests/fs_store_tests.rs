use lockbox_storage::FsByteStorage;
use lockbox_types::{ByteStorage, StoreError};

fn store() -> (tempfile::TempDir, FsByteStorage) {
    let dir = tempfile::tempdir().unwrap();
    let store = FsByteStorage::open(dir.path().join("blobs")).unwrap();
    (dir, store)
}

#[test]
fn put_get_round_trip() {
    let (_dir, store) = store();
    let loc = store.put(b"sealed bytes", "photo.jpg").unwrap();
    assert!(loc.ends_with("-photo.jpg"));
    assert_eq!(store.get(&loc).unwrap(), b"sealed bytes");
    assert!(store.root().join(&loc).exists());
}

#[test]
fn delete_removes_file() {
    let (_dir, store) = store();
    let loc = store.put(&[7u8; 4096], "big.bin").unwrap();

    assert!(store.delete(&loc).unwrap());
    assert!(!store.root().join(&loc).exists());
    assert!(matches!(store.get(&loc), Err(StoreError::NotFound(_))));
}

#[test]
fn delete_missing_returns_false() {
    let (_dir, store) = store();
    assert!(!store.delete("nothing-here").unwrap());
}

#[test]
fn empty_blob_is_fine() {
    let (_dir, store) = store();
    let loc = store.put(b"", "empty").unwrap();
    assert!(store.get(&loc).unwrap().is_empty());
    assert!(store.delete(&loc).unwrap());
}

#[test]
fn rejects_path_traversal() {
    let (_dir, store) = store();
    for name in ["../escape", "a/b", "..", "", "a\\b"] {
        assert!(store.put(b"x", name).is_err(), "{name:?} accepted");
    }
    assert!(store.get("../etc/passwd").is_err());
    assert!(store.delete("../etc/passwd").is_err());
}
