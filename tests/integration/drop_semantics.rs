use holocene::StorageError;
use std::fs;
use tempfile::TempDir;

use crate::integration::support::fixture;

#[test]
fn dropping_an_unlocked_resource_is_refused() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    assert!(matches!(res.drop(), Err(StorageError::NotLocked(_))));
    assert!(res.exists());
}

#[test]
fn dropped_resource_is_gone_for_every_handle() {
    let temp = TempDir::new().unwrap();
    let (_holo, db, mut res) = fixture(temp.path());
    let mut other = db.resource(res.name()).unwrap();

    res.lock().unwrap();
    let v1 = res.write_and_commit(&b"data"[..], None, &[]).unwrap();
    res.drop().unwrap();
    assert!(!res.is_locked());

    assert!(matches!(res.read(&v1), Err(StorageError::NotFound(_))));
    assert!(matches!(other.read(&v1), Err(StorageError::NotFound(_))));
    assert!(matches!(other.lock(), Err(StorageError::NotFound(_))));
    assert!(matches!(res.unlock(), Err(StorageError::NotLocked(_))));

    // Nothing, not even the renamed directory, is left behind.
    let leftovers: Vec<_> = fs::read_dir(db.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[test]
fn dropping_a_database_removes_its_resources() {
    let temp = TempDir::new().unwrap();
    let (holo, db, res) = fixture(temp.path());

    holo.drop_db(db.name()).unwrap();
    assert!(!db.exists());
    assert!(!res.exists());
    assert!(holo.list_dbs().unwrap().is_empty());
    assert!(matches!(holo.open_db(db.name()), Err(StorageError::NotFound(_))));
}

#[test]
fn releasing_a_replaced_marker_reports_foreign_lock() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    res.lock().unwrap();

    let marker = res.path().join(holocene::lock::LOCK_FILE_NAME);
    fs::write(
        &marker,
        r#"{"token":"someone-else","pid":1,"acquired_at":"2024-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    assert!(matches!(res.unlock(), Err(StorageError::ForeignLock(_))));
    assert!(marker.exists());
}
