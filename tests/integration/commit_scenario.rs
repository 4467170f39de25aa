use holocene::types::JSON_CONTENT_TYPE;
use holocene::{Identifier, StorageError};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::integration::support::fixture;

#[test]
fn linear_history_then_stale_commit_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut r1) = fixture(temp.path());

    r1.lock().unwrap();
    let v1 = r1.write_object(&json!({"a": 1})).unwrap();
    assert_eq!(r1.commit(v1, None, &[]).unwrap(), v1);
    assert_eq!(r1.head().unwrap(), Some(v1));
    assert_eq!(r1.default_type().unwrap().as_deref(), Some(JSON_CONTENT_TYPE));

    let v2 = r1.write_object(&json!({"a": 2})).unwrap();
    r1.commit(v2, None, &[v1]).unwrap();
    assert_eq!(r1.head().unwrap(), Some(v2));

    let v3 = r1.write_object(&json!({"a": 3})).unwrap();
    match r1.commit(v3, None, &[v1]) {
        Err(StorageError::Conflict { rejected, .. }) => assert_eq!(rejected, vec![v1]),
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_eq!(r1.head().unwrap(), Some(v2));
    assert_eq!(r1.leaves().unwrap(), vec![v2]);

    let current: Value = r1.read_object(None).unwrap();
    assert_eq!(current, json!({"a": 2}));

    // Revisions stay readable whether or not they were committed.
    let first: Value = serde_json::from_reader(r1.read(&v1).unwrap()).unwrap();
    assert_eq!(first, json!({"a": 1}));
    let rejected: Value = serde_json::from_reader(r1.read(&v3).unwrap()).unwrap();
    assert_eq!(rejected, json!({"a": 3}));

    r1.unlock().unwrap();
}

#[test]
fn second_commit_without_supplants_conflicts() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    res.lock().unwrap();

    let v1 = res.write_bytes(b"one", "text/plain").unwrap();
    res.commit(v1, None, &[]).unwrap();
    let v2 = res.write_bytes(b"two", "text/plain").unwrap();
    let err = res.commit(v2, None, &[]).unwrap_err();
    assert!(err.is_retryable());

    // Retrying against the current leaves succeeds.
    let leaves = res.leaves().unwrap();
    res.commit(v2, None, &leaves).unwrap();
    assert_eq!(res.head().unwrap(), Some(v2));
}

#[test]
fn commit_requires_lock_and_existing_revision() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());

    let v1 = res.write_bytes(b"unlocked write", "text/plain").unwrap();
    assert!(matches!(
        res.commit(v1, None, &[]),
        Err(StorageError::NotLocked(_))
    ));

    res.lock().unwrap();
    assert!(matches!(
        res.commit(Identifier::random(), None, &[]),
        Err(StorageError::NotFound(_))
    ));
    res.commit(v1, None, &[]).unwrap();
    assert!(matches!(
        res.commit(v1, None, &[v1]),
        Err(StorageError::Conflict { .. })
    ));
}

#[test]
fn heads_are_tracked_per_content_type() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    res.lock().unwrap();

    let json_rev = res.write_and_commit(&b"{}"[..], Some(JSON_CONTENT_TYPE), &[]).unwrap();
    let text_rev = res
        .write_and_commit(&b"plain"[..], Some("text/plain"), &[json_rev])
        .unwrap();

    assert_eq!(res.head().unwrap(), Some(text_rev));
    assert_eq!(res.default_type().unwrap().as_deref(), Some(JSON_CONTENT_TYPE));
    assert_eq!(res.current_revision(None).unwrap(), json_rev);
    assert_eq!(res.current_revision(Some("text/plain")).unwrap(), text_rev);
    assert!(matches!(
        res.current_revision(Some("image/png")),
        Err(StorageError::NotFound(_))
    ));

    let text = res.read_current(Some("text/plain")).unwrap().into_bytes().unwrap();
    assert_eq!(text, b"plain");
}

#[test]
fn history_survives_reopening() {
    let temp = TempDir::new().unwrap();
    let (holo, db, mut res) = fixture(temp.path());
    res.lock().unwrap();
    let v1 = res.write_object_and_commit(&json!({"n": 1})).unwrap();
    let v2 = res.write_object_and_commit(&json!({"n": 2})).unwrap();
    res.unlock().unwrap();

    let reopened = holo.database(db.name()).unwrap().resource(res.name()).unwrap();
    let revisions: Vec<_> = reopened
        .history()
        .iter()
        .unwrap()
        .map(|commit| commit.unwrap().revision)
        .collect();
    assert_eq!(revisions, vec![v1, v2]);
    assert_eq!(reopened.head().unwrap(), Some(v2));
}

#[test]
fn first_commit_supplanting_itself_can_still_be_supplanted() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    res.lock().unwrap();

    let v1 = res.write_bytes(b"one", "text/plain").unwrap();
    res.commit(v1, None, &[v1, Identifier::random()]).unwrap();
    assert_eq!(res.leaves().unwrap(), vec![v1]);

    let v2 = res.write_bytes(b"two", "text/plain").unwrap();
    let leaves = res.leaves().unwrap();
    res.commit(v2, None, &leaves).unwrap();
    assert_eq!(res.head().unwrap(), Some(v2));
    assert_eq!(res.leaves().unwrap(), vec![v2]);
}
