use holocene::StorageError;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

use crate::integration::support::fixture;

#[test]
fn exactly_one_thread_wins_the_resource_lock() {
    let temp = TempDir::new().unwrap();
    let (holo, db, res) = fixture(temp.path());
    let (db_name, res_name) = (db.name(), res.name());

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let holo = holo.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut res = holo.database(db_name).unwrap().resource(res_name).unwrap();
                barrier.wait();
                match res.lock() {
                    Ok(()) => Some(res),
                    Err(StorageError::AlreadyLocked(_)) => None,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            })
        })
        .collect();

    let mut winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(winners.len(), 1);

    let mut winner = winners.pop().unwrap();
    winner.unlock().unwrap();
    assert!(matches!(winner.unlock(), Err(StorageError::NotLocked(_))));
}

#[test]
fn concurrent_committers_serialize_through_the_lock() {
    let temp = TempDir::new().unwrap();
    let (holo, db, res) = fixture(temp.path());
    let (db_name, res_name) = (db.name(), res.name());

    let writers = 4;
    let per_writer = 5;
    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let holo = holo.clone();
            thread::spawn(move || {
                let db = holo.database(db_name).unwrap();
                let mut committed = 0;
                while committed < per_writer {
                    let mut res = match db.lock_resource(res_name) {
                        Ok(res) => res,
                        Err(e) if e.is_retryable() => {
                            thread::yield_now();
                            continue;
                        }
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                    let leaves = res.leaves().unwrap();
                    let body = format!("writer {} commit {}", w, committed);
                    res.write_and_commit(body.as_bytes(), Some("text/plain"), &leaves)
                        .unwrap();
                    res.unlock().unwrap();
                    committed += 1;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let res = holo.database(db_name).unwrap().resource(res_name).unwrap();
    let commits = res.history().iter().unwrap().count();
    assert_eq!(commits, writers * per_writer);
    assert_eq!(res.leaves().unwrap().len(), 1);
}

#[test]
fn database_and_resource_locks_are_independent() {
    let temp = TempDir::new().unwrap();
    let (holo, db, mut res) = fixture(temp.path());

    let mut opened = holo.open_db(db.name()).unwrap();
    res.lock().unwrap();
    assert!(opened.is_open());
    assert!(res.is_locked());

    res.unlock().unwrap();
    opened.close().unwrap();
}
